//! Command-line interface definition (spec §6.1).
//!
//! Uses [clap] derive macros to parse arguments, then layers the resulting
//! flags on top of whatever [`Config`](hostaudit::config::Config) was loaded
//! from an on-disk file — CLI flags always win. This module is only used by
//! the binary crate (`src/main.rs`).

use std::path::PathBuf;

use clap::Parser;
use hostaudit::config::Config;
use hostaudit::output::OutputFormat;

/// Read-only Linux host security posture enumerator.
#[derive(Parser)]
#[command(name = "hostaudit", version, about = "Read-only Linux host security posture enumerator")]
pub struct Cli {
    /// Path to a TOML config file layered under these flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Single-line JSON/NDJSON instead of pretty-printed.
    #[arg(long)]
    pub compact: bool,

    /// Sort scanners alphabetically instead of registration order.
    #[arg(long)]
    pub canonical: bool,

    /// Increases logging verbosity; repeatable (`-v`, `-vv`).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, value_delimiter = ',')]
    pub enable: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub disable: Vec<String>,

    #[arg(long = "min-severity", default_value = "info")]
    pub min_severity: String,
    #[arg(long = "fail-on", default_value = "critical")]
    pub fail_on: String,
    #[arg(long = "fail-on-count", default_value_t = -1)]
    pub fail_on_count: i64,

    #[arg(long = "all-processes")]
    pub all_processes: bool,
    #[arg(long = "process-hash")]
    pub process_hash: bool,
    #[arg(long = "process-inventory")]
    pub process_inventory: bool,
    #[arg(long = "max-processes", default_value_t = -1)]
    pub max_processes: i64,
    #[arg(long = "max-sockets", default_value_t = -1)]
    pub max_sockets: i64,

    #[arg(long = "modules-summary")]
    pub modules_summary: bool,
    #[arg(long = "modules-anomalies-only")]
    pub modules_anomalies_only: bool,
    #[arg(long = "modules-hash")]
    pub modules_hash: bool,

    #[arg(long = "network-listen-only")]
    pub network_listen_only: bool,
    #[arg(long = "network-proto")]
    pub network_proto: Option<String>,
    #[arg(long = "network-states", value_delimiter = ',')]
    pub network_states: Vec<String>,
    #[arg(long = "network-advanced")]
    pub network_advanced: bool,
    #[arg(long = "network-fanout-threshold", default_value_t = 100)]
    pub network_fanout_threshold: i64,
    #[arg(long = "network-fanout-unique-threshold", default_value_t = 50)]
    pub network_fanout_unique_threshold: i64,
    #[arg(long = "network-debug")]
    pub network_debug: bool,

    #[arg(long = "ioc-allow", value_delimiter = ',')]
    pub ioc_allow: Vec<String>,
    #[arg(long = "ioc-allow-file")]
    pub ioc_allow_file: Option<PathBuf>,
    #[arg(long = "ioc-env-trust")]
    pub ioc_env_trust: bool,
    #[arg(long = "ioc-exec-trace")]
    pub ioc_exec_trace: bool,
    #[arg(long = "ioc-exec-trace-seconds", default_value_t = 3)]
    pub ioc_exec_trace_seconds: i64,

    #[arg(long = "suid-expected", value_delimiter = ',')]
    pub suid_expected: Vec<String>,
    #[arg(long = "suid-expected-file")]
    pub suid_expected_file: Option<PathBuf>,

    #[arg(long = "fs-hygiene")]
    pub fs_hygiene: bool,
    #[arg(long = "fs-world-writable-limit", default_value_t = 1000)]
    pub fs_world_writable_limit: i64,
    #[arg(long = "world-writable-dirs", value_delimiter = ',')]
    pub world_writable_dirs: Vec<String>,
    #[arg(long = "world-writable-exclude", value_delimiter = ',')]
    pub world_writable_exclude: Vec<String>,

    #[arg(long)]
    pub hardening: bool,
    #[arg(long)]
    pub containers: bool,
    #[arg(long = "container-id")]
    pub container_id: Option<String>,

    #[arg(long = "rules-enable")]
    pub rules_enable: bool,
    #[arg(long = "rules-dir")]
    pub rules_dir: Option<PathBuf>,
    #[arg(long = "rules-allow-legacy")]
    pub rules_allow_legacy: bool,

    #[arg(long)]
    pub parallel: bool,
    #[arg(long = "parallel-threads", default_value_t = 4)]
    pub parallel_threads: i64,

    #[arg(long)]
    pub integrity: bool,
    #[arg(long = "integrity-ima")]
    pub integrity_ima: bool,
    #[arg(long = "integrity-pkg-verify")]
    pub integrity_pkg_verify: bool,
    #[arg(long = "integrity-pkg-limit", default_value_t = 500)]
    pub integrity_pkg_limit: i64,
    #[arg(long = "integrity-pkg-rehash")]
    pub integrity_pkg_rehash: bool,
    #[arg(long = "integrity-pkg-rehash-limit", default_value_t = 50)]
    pub integrity_pkg_rehash_limit: i64,

    #[arg(long = "no-user-meta")]
    pub no_user_meta: bool,
    #[arg(long = "no-cmdline-meta")]
    pub no_cmdline_meta: bool,
    #[arg(long = "no-hostname-meta")]
    pub no_hostname_meta: bool,

    #[arg(long = "fast-scan")]
    pub fast_scan: bool,
    #[arg(long)]
    pub timings: bool,
}

impl Cli {
    /// Layers parsed flags on top of a loaded [`Config`]; CLI flags always
    /// win over the on-disk file (spec §1 ambient-stack note).
    pub fn apply_to(&self, config: &mut Config) {
        config.min_severity = self.min_severity.clone();
        config.fail_on_severity = self.fail_on.clone();
        config.fail_on_count = self.fail_on_count;

        config.pretty = matches!(self.format, OutputFormat::Pretty);
        config.ndjson = matches!(self.format, OutputFormat::Ndjson);
        config.sarif = matches!(self.format, OutputFormat::Sarif);
        config.compact = self.compact;
        config.canonical = self.canonical;
        config.output_file = self.output.as_ref().map(|p| p.display().to_string());

        if !self.enable.is_empty() {
            config.enable_scanners = self.enable.clone();
        }
        if !self.disable.is_empty() {
            config.disable_scanners = self.disable.clone();
        }

        config.all_processes = self.all_processes;
        config.process_hash = self.process_hash;
        config.process_inventory = self.process_inventory;
        config.max_processes = self.max_processes;
        config.max_sockets = self.max_sockets;

        config.modules_summary_only = self.modules_summary;
        config.modules_anomalies_only = self.modules_anomalies_only;
        config.modules_hash = self.modules_hash;

        config.network_listen_only = self.network_listen_only;
        if self.network_proto.is_some() {
            config.network_proto = self.network_proto.clone();
        }
        if !self.network_states.is_empty() {
            config.network_states = self.network_states.clone();
        }
        config.network_advanced = self.network_advanced;
        config.network_fanout_threshold = self.network_fanout_threshold;
        config.network_fanout_unique_threshold = self.network_fanout_unique_threshold;
        config.network_debug = self.network_debug;

        if !self.ioc_allow.is_empty() {
            config.ioc_allow = self.ioc_allow.clone();
        }
        if self.ioc_allow_file.is_some() {
            config.ioc_allow_file = self.ioc_allow_file.as_ref().map(|p| p.display().to_string());
        }
        config.ioc_env_trust = self.ioc_env_trust;
        config.ioc_exec_trace = self.ioc_exec_trace;
        config.ioc_exec_trace_seconds = self.ioc_exec_trace_seconds;

        if !self.suid_expected.is_empty() {
            config.suid_expected_add = self.suid_expected.clone();
        }
        if self.suid_expected_file.is_some() {
            config.suid_expected_file = self.suid_expected_file.as_ref().map(|p| p.display().to_string());
        }

        config.fs_hygiene = self.fs_hygiene;
        config.fs_world_writable_limit = self.fs_world_writable_limit;
        if !self.world_writable_dirs.is_empty() {
            config.world_writable_dirs = self.world_writable_dirs.clone();
        }
        if !self.world_writable_exclude.is_empty() {
            config.world_writable_exclude = self.world_writable_exclude.clone();
        }

        config.hardening = self.hardening;
        config.containers = self.containers;
        if self.container_id.is_some() {
            config.container_id_filter = self.container_id.clone();
        }

        config.rules_enable = self.rules_enable;
        if self.rules_dir.is_some() {
            config.rules_dir = self.rules_dir.as_ref().map(|p| p.display().to_string());
        }
        config.rules_allow_legacy = self.rules_allow_legacy;

        config.parallel = self.parallel;
        config.parallel_max_threads = self.parallel_threads;

        config.integrity = self.integrity;
        config.integrity_ima = self.integrity_ima;
        config.integrity_pkg_verify = self.integrity_pkg_verify;
        config.integrity_pkg_limit = self.integrity_pkg_limit;
        config.integrity_pkg_rehash = self.integrity_pkg_rehash;
        config.integrity_pkg_rehash_limit = self.integrity_pkg_rehash_limit;

        config.no_user_meta = self.no_user_meta;
        config.no_cmdline_meta = self.no_cmdline_meta;
        config.no_hostname_meta = self.no_hostname_meta;

        config.fast_scan = self.fast_scan;
        config.timings = self.timings;
    }
}
