//! Engine configuration (spec §6.2).
//!
//! [`Config`] is a flat record of every knob the scanners read. It is
//! constructed once by the CLI collaborator (see `cli.rs`) and is read-only
//! for the remainder of the run — any number of scanners may read it
//! concurrently (spec §5).
//!
//! An optional on-disk TOML file can seed defaults; CLI flags always take
//! precedence, matching the override order the teacher crate used for its
//! own (much smaller) `Config::load`.

use std::path::{Path, PathBuf};

/// Errors from loading an on-disk config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Complete engine configuration (spec §6.2).
///
/// All fields default to the conservative "default scan" behavior so a
/// `Config::default()` is a reasonable run on its own.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    // --- strings ---
    pub min_severity: String,
    pub fail_on_severity: String,
    pub output_file: Option<String>,
    pub rules_dir: Option<String>,
    pub container_id_filter: Option<String>,
    pub ioc_allow_file: Option<String>,
    pub suid_expected_file: Option<String>,
    pub network_proto: Option<String>,
    pub sign_gpg_key: Option<String>,
    pub write_env_file: Option<String>,

    // --- booleans ---
    pub pretty: bool,
    pub compact: bool,
    pub canonical: bool,
    pub ndjson: bool,
    pub sarif: bool,
    pub all_processes: bool,
    pub modules_summary_only: bool,
    pub modules_anomalies_only: bool,
    pub modules_hash: bool,
    pub integrity: bool,
    pub integrity_ima: bool,
    pub integrity_pkg_verify: bool,
    pub integrity_pkg_rehash: bool,
    pub fs_hygiene: bool,
    pub process_hash: bool,
    pub process_inventory: bool,
    pub network_debug: bool,
    pub network_listen_only: bool,
    pub network_advanced: bool,
    pub ioc_env_trust: bool,
    pub ioc_exec_trace: bool,
    pub parallel: bool,
    pub hardening: bool,
    pub containers: bool,
    pub rules_enable: bool,
    pub rules_allow_legacy: bool,
    pub sign_gpg: bool,
    pub compliance: bool,
    pub drop_priv: bool,
    pub keep_cap_dac: bool,
    pub seccomp: bool,
    pub seccomp_strict: bool,
    pub no_user_meta: bool,
    pub no_cmdline_meta: bool,
    pub no_hostname_meta: bool,
    pub fast_scan: bool,
    pub timings: bool,

    // --- ints (-1 = unlimited unless noted) ---
    pub max_processes: i64,
    pub max_sockets: i64,
    pub integrity_pkg_limit: i64,
    pub integrity_pkg_rehash_limit: i64,
    pub fs_world_writable_limit: i64,
    pub parallel_max_threads: i64,
    pub fail_on_count: i64,
    pub network_fanout_threshold: i64,
    pub network_fanout_unique_threshold: i64,
    pub ioc_exec_trace_seconds: i64,

    // --- string lists ---
    pub enable_scanners: Vec<String>,
    pub disable_scanners: Vec<String>,
    pub network_states: Vec<String>,
    pub ioc_allow: Vec<String>,
    pub suid_expected_add: Vec<String>,
    pub world_writable_dirs: Vec<String>,
    pub world_writable_exclude: Vec<String>,
    pub compliance_standards: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_severity: "info".to_string(),
            fail_on_severity: "critical".to_string(),
            output_file: None,
            rules_dir: None,
            container_id_filter: None,
            ioc_allow_file: None,
            suid_expected_file: None,
            network_proto: None,
            sign_gpg_key: None,
            write_env_file: None,

            pretty: true,
            compact: false,
            canonical: false,
            ndjson: false,
            sarif: false,
            all_processes: false,
            modules_summary_only: false,
            modules_anomalies_only: false,
            modules_hash: false,
            integrity: false,
            integrity_ima: false,
            integrity_pkg_verify: false,
            integrity_pkg_rehash: false,
            fs_hygiene: false,
            process_hash: false,
            process_inventory: true,
            network_debug: false,
            network_listen_only: false,
            network_advanced: false,
            ioc_env_trust: false,
            ioc_exec_trace: false,
            parallel: false,
            hardening: false,
            containers: false,
            rules_enable: false,
            rules_allow_legacy: false,
            sign_gpg: false,
            compliance: false,
            drop_priv: false,
            keep_cap_dac: false,
            seccomp: false,
            seccomp_strict: false,
            no_user_meta: false,
            no_cmdline_meta: false,
            no_hostname_meta: false,
            fast_scan: false,
            timings: false,

            max_processes: -1,
            max_sockets: -1,
            integrity_pkg_limit: 500,
            integrity_pkg_rehash_limit: 50,
            fs_world_writable_limit: 1000,
            parallel_max_threads: 4,
            fail_on_count: -1,
            network_fanout_threshold: 100,
            network_fanout_unique_threshold: 50,
            ioc_exec_trace_seconds: 3,

            enable_scanners: Vec::new(),
            disable_scanners: Vec::new(),
            network_states: Vec::new(),
            ioc_allow: Vec::new(),
            suid_expected_add: Vec::new(),
            world_writable_dirs: Vec::new(),
            world_writable_exclude: Vec::new(),
            compliance_standards: Vec::new(),
        }
    }
}

impl Config {
    /// Loads a TOML config file, falling back to [`Config::default`] when
    /// `path` is `None` and no `hostaudit.toml` exists in the cwd.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config_path = match path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => {
                let default_path = Path::new("hostaudit.toml");
                default_path.exists().then(|| default_path.to_path_buf())
            }
        };

        match config_path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| ConfigError::Read { path: path.clone(), source: e })?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse { path, source: e })
            }
            None => Ok(Config::default()),
        }
    }

    /// `true` when `name` is eligible to run: if `enable_scanners` is
    /// non-empty only those names are eligible, otherwise everything not in
    /// `disable_scanners` is (spec §4.G).
    pub fn is_scanner_enabled(&self, name: &str) -> bool {
        if !self.enable_scanners.is_empty() {
            return self.enable_scanners.iter().any(|s| s == name);
        }
        !self.disable_scanners.iter().any(|s| s == name)
    }

    /// `--fast-scan` disables the heavy scanners (spec §6.1): modules deep
    /// scan (hashing/decompression), integrity rehash, YARA, and eBPF.
    pub fn fast_scan_disables(&self, name: &str) -> bool {
        self.fast_scan
            && matches!(name, "modules" | "integrity" | "yara" | "ebpf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_everything() {
        let c = Config::default();
        assert!(c.is_scanner_enabled("process"));
        assert!(c.is_scanner_enabled("anything"));
    }

    #[test]
    fn enable_scanners_is_an_allowlist() {
        let mut c = Config::default();
        c.enable_scanners = vec!["process".to_string()];
        assert!(c.is_scanner_enabled("process"));
        assert!(!c.is_scanner_enabled("network"));
    }

    #[test]
    fn disable_scanners_is_a_denylist() {
        let mut c = Config::default();
        c.disable_scanners = vec!["network".to_string()];
        assert!(c.is_scanner_enabled("process"));
        assert!(!c.is_scanner_enabled("network"));
    }
}
