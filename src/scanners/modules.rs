//! Kernel module scanner (spec §4.J).
//!
//! Cross-references `/proc/modules`, `modules.dep`/`modules.builtin`, and
//! `/sys/module` to find hidden, missing, or out-of-tree modules, then
//! inspects on-disk `.ko`/`.ko.xz`/`.ko.gz` objects for missing signatures
//! and suspicious ELF sections.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::ScanContext;
use crate::finding::{DiagnosticCode, Finding};
use crate::helpers::compression::{gunzip_capped, unxz_capped};
use crate::helpers::elf::{parse_sections, SHF_EXECINSTR, SHF_WRITE};
use crate::helpers::hash::sha256_bytes_capped;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "modules";
const DECOMPRESS_CAP_BYTES: usize = 16 * 1024 * 1024;
const MODULE_HASH_CAP_BYTES: usize = 2 * 1024 * 1024;
const LARGE_TEXT_BYTES: u64 = 5 * 1024 * 1024;
const SIGNATURE_MARKER: &[u8] = b"Module signature appended";

const OUT_OF_TREE_MARKERS: &[&str] = &["/extra/", "/updates/", "dkms", "nvidia", "virtualbox", "vmware"];
const SUSPICIOUS_SECTION_NAMES: &[&str] = &[".evil", ".rootkit", ".hide", ".__mod", ".__kern", ".backdoor"];

/// Canonical Linux taint bit -> flag name table (spec §4.J "Taint decode").
const TAINT_BITS: &[(u32, &str)] = &[
    (0, "proprietary_module"),
    (1, "forced_module"),
    (2, "unsafe_smp"),
    (3, "force_unload"),
    (4, "machine_check"),
    (5, "bad_page"),
    (6, "user_tainted"),
    (7, "die_tainted"),
    (8, "overridden_acpi_table"),
    (9, "external_support"),
    (10, "crap"),
    (11, "firmware_workaround"),
    (12, "crash"),
    (13, "oot_module"),
    (14, "unsigned_module"),
    (15, "in_kernel_panic"),
    (16, "cpu_out_of_spec"),
    (17, "unstable_randstruct"),
];

struct ModuleInventory {
    proc_modules: Vec<String>,
    dep_paths: HashMap<String, PathBuf>,
    builtin: HashSet<String>,
    sysfs: HashSet<String>,
}

#[derive(Default)]
struct ModuleAnomalies {
    out_of_tree: bool,
    unsigned: Option<bool>,
    missing_file: bool,
    hidden_sysfs: bool,
    sysfs_only: bool,
    wx_section: bool,
    large_text_section: bool,
    suspicious_section_name: bool,
    sha256: Option<String>,
}

impl ModuleAnomalies {
    fn any(&self) -> bool {
        self.out_of_tree
            || self.unsigned == Some(true)
            || self.missing_file
            || self.hidden_sysfs
            || self.sysfs_only
            || self.wx_section
            || self.large_text_section
            || self.suspicious_section_name
    }

    fn highest_severity_tier(&self) -> Severity {
        if self.unsigned == Some(true) || self.hidden_sysfs || self.missing_file {
            Severity::High
        } else if self.any() {
            Severity::Medium
        } else {
            Severity::Info
        }
    }
}

pub struct ModuleScanner;

impl Scanner for ModuleScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Inventories loaded kernel modules and flags unsigned, hidden, or out-of-tree objects"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let inventory = load_inventory();

        if !ctx.config.modules_anomalies_only && !ctx.config.modules_summary_only {
            for line in &inventory.proc_modules {
                let name = line.split_whitespace().next().unwrap_or(line);
                ctx.report.add_finding(NAME, Finding::new(name.to_string(), format!("Module {name}"), Severity::Info, line.clone()));
            }
        }

        let mut summary_out_of_tree = false;
        let mut summary_severe = false;

        let names: BTreeSet<String> = inventory
            .proc_modules
            .iter()
            .filter_map(|l| l.split_whitespace().next())
            .map(str::to_string)
            .chain(inventory.sysfs.iter().cloned())
            .chain(inventory.dep_paths.keys().cloned())
            .collect();

        for name in &names {
            let anomalies = self.evaluate(ctx, &inventory, name);

            summary_out_of_tree |= anomalies.out_of_tree;
            summary_severe |= anomalies.unsigned == Some(true) || anomalies.hidden_sysfs || anomalies.missing_file || anomalies.sysfs_only;

            if ctx.config.modules_anomalies_only && anomalies.any() {
                self.emit_anomaly(ctx, name, &anomalies);
            }
        }

        if !ctx.config.modules_anomalies_only && ctx.config.modules_summary_only {
            let severity = if summary_severe {
                Severity::High
            } else if summary_out_of_tree {
                Severity::Medium
            } else {
                Severity::Info
            };
            ctx.report.add_finding(
                NAME,
                Finding::new("module_summary", "Module summary", severity, format!("{} modules inventoried", names.len())),
            );
        }

        self.emit_taint(ctx);
    }
}

impl ModuleScanner {
    fn evaluate(&self, ctx: &ScanContext<'_>, inv: &ModuleInventory, name: &str) -> ModuleAnomalies {
        let mut anomalies = ModuleAnomalies::default();

        let in_proc = inv.proc_modules.iter().any(|l| l.split_whitespace().next() == Some(name));
        let in_sysfs = inv.sysfs.contains(name);
        let in_builtin = inv.builtin.contains(name);
        let dep_path = inv.dep_paths.get(name);

        anomalies.hidden_sysfs = in_proc && !in_sysfs && !in_builtin;
        anomalies.sysfs_only = in_sysfs && !in_builtin && !in_proc;

        if let Some(path) = dep_path {
            anomalies.out_of_tree = OUT_OF_TREE_MARKERS.iter().any(|m| path.to_string_lossy().contains(m));

            if path.exists() {
                if let Ok(data) = read_module_bytes(ctx, name, path) {
                    anomalies.unsigned = Some(!data.windows(SIGNATURE_MARKER.len()).any(|w| w == SIGNATURE_MARKER));
                    if ctx.config.modules_hash {
                        anomalies.sha256 = Some(sha256_bytes_capped(&data, MODULE_HASH_CAP_BYTES));
                    }
                    if let Some(sections) = parse_sections(&data) {
                        for section in &sections {
                            if section.flags & SHF_WRITE != 0 && section.flags & SHF_EXECINSTR != 0 {
                                anomalies.wx_section = true;
                            }
                            if section.name == ".text" && section.size > LARGE_TEXT_BYTES {
                                anomalies.large_text_section = true;
                            }
                            if is_suspicious_section_name(&section.name) {
                                anomalies.suspicious_section_name = true;
                            }
                        }
                    }
                }
            } else {
                anomalies.missing_file = true;
            }
        }

        anomalies
    }

    fn emit_anomaly(&self, ctx: &ScanContext<'_>, name: &str, anomalies: &ModuleAnomalies) {
        let mut finding = Finding::new(name.to_string(), format!("Module anomaly: {name}"), anomalies.highest_severity_tier(), name.to_string());

        if anomalies.unsigned == Some(true) {
            finding = finding.meta("unsigned", "true");
        }
        if anomalies.out_of_tree {
            finding = finding.meta("out_of_tree", "true");
        }
        if anomalies.hidden_sysfs {
            finding = finding.meta("hidden_sysfs", "true");
        }
        if anomalies.missing_file {
            finding = finding.meta("missing_file", "true");
        }
        if anomalies.wx_section {
            finding = finding.meta("wx_section", "true");
        }
        if anomalies.large_text_section {
            finding = finding.meta("large_text_section", "true");
        }
        if anomalies.suspicious_section_name {
            finding = finding.meta("suspicious_section_name", "true");
        }
        if let Some(sha256) = &anomalies.sha256 {
            finding = finding.meta("sha256", sha256.clone());
        }

        ctx.report.add_finding(NAME, finding);
    }

    fn emit_taint(&self, ctx: &ScanContext<'_>) {
        let raw = match fs::read_to_string("/proc/sys/kernel/tainted") {
            Ok(r) => r,
            Err(_) => return,
        };
        let value: u64 = match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => return,
        };
        if value == 0 {
            return;
        }

        let flags: Vec<&str> = TAINT_BITS.iter().filter(|(bit, _)| value & (1 << bit) != 0).map(|(_, name)| *name).collect();

        ctx.report.add_finding(
            NAME,
            Finding::new("kernel_taint", "Kernel taint flags set", Severity::Medium, format!("tainted={value}"))
                .meta("taint_value", value.to_string())
                .meta("taint_flags", flags.join(",")),
        );
    }
}

fn is_suspicious_section_name(name: &str) -> bool {
    if SUSPICIOUS_SECTION_NAMES.contains(&name) {
        return true;
    }
    if let Some(rest) = name.strip_prefix('.') {
        if rest.len() == 1 {
            return true;
        }
        let first = rest.chars().next();
        let last = rest.chars().last();
        if let (Some(f), Some(l)) = (first, last) {
            if f.is_ascii_digit() && l.is_ascii_digit() {
                return true;
            }
        }
    }
    false
}

fn read_module_bytes(ctx: &ScanContext<'_>, name: &str, path: &Path) -> Result<Vec<u8>, ()> {
    let raw = fs::read(path).map_err(|_| ())?;
    let path_str = path.to_string_lossy();

    let decompressed = if path_str.ends_with(".ko.xz") {
        unxz_capped(&raw, DECOMPRESS_CAP_BYTES)
    } else if path_str.ends_with(".ko.gz") {
        gunzip_capped(&raw, DECOMPRESS_CAP_BYTES)
    } else {
        return Ok(raw);
    };

    match decompressed {
        Some(data) => Ok(data),
        None => {
            ctx.report.add_warning(NAME, DiagnosticCode::DecompressFail, format!("{name}: decompression failed or exceeded cap"));
            Err(())
        }
    }
}

fn load_inventory() -> ModuleInventory {
    let uname_release = read_uname_release();

    let proc_modules = fs::read_to_string("/proc/modules")
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default();

    let dep_paths = uname_release
        .as_ref()
        .and_then(|release| fs::read_to_string(format!("/lib/modules/{release}/modules.dep")).ok())
        .map(parse_modules_dep)
        .unwrap_or_default();

    let builtin = uname_release
        .as_ref()
        .and_then(|release| fs::read_to_string(format!("/lib/modules/{release}/modules.builtin")).ok())
        .map(|s| s.lines().filter_map(|l| module_name_from_path(l)).collect())
        .unwrap_or_default();

    let sysfs = fs::read_dir("/sys/module")
        .map(|entries| entries.flatten().filter_map(|e| e.file_name().to_str().map(str::to_string)).collect())
        .unwrap_or_default();

    ModuleInventory {
        proc_modules,
        dep_paths,
        builtin,
        sysfs,
    }
}

fn read_uname_release() -> Option<String> {
    fs::read_to_string("/proc/sys/kernel/osrelease").ok().map(|s| s.trim().to_string())
}

fn parse_modules_dep(content: String) -> HashMap<String, PathBuf> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let path_part = line.split(':').next().unwrap_or(line);
        if let Some(name) = module_name_from_path(path_part) {
            map.insert(name, PathBuf::from(path_part.trim()));
        }
    }
    map
}

fn module_name_from_path(path: &str) -> Option<String> {
    let base = path.trim().rsplit('/').next()?;
    let stripped = base.strip_suffix(".ko.xz").or_else(|| base.strip_suffix(".ko.gz")).or_else(|| base.strip_suffix(".ko")).unwrap_or(base);
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_strips_extension_and_normalizes_dashes() {
        assert_eq!(module_name_from_path("/lib/modules/6.1/kernel/drivers/nvidia-drm.ko.xz"), Some("nvidia_drm".to_string()));
        assert_eq!(module_name_from_path("e1000e.ko"), Some("e1000e".to_string()));
    }

    #[test]
    fn out_of_tree_detects_dkms_path() {
        let path = PathBuf::from("/lib/modules/6.1/updates/dkms/nvidia.ko");
        assert!(OUT_OF_TREE_MARKERS.iter().any(|m| path.to_string_lossy().contains(m)));
    }

    #[test]
    fn suspicious_section_names_are_flagged() {
        assert!(is_suspicious_section_name(".rootkit"));
        assert!(is_suspicious_section_name(".x"));
        assert!(is_suspicious_section_name(".1x2"));
        assert!(!is_suspicious_section_name(".text"));
        assert!(!is_suspicious_section_name(".data"));
    }

    #[test]
    fn taint_bits_decode_expected_flags() {
        let value: u64 = (1 << 13) | (1 << 14); // oot + unsigned
        let flags: Vec<&str> = TAINT_BITS.iter().filter(|(bit, _)| value & (1 << bit) != 0).map(|(_, n)| *n).collect();
        assert_eq!(flags, vec!["oot_module", "unsigned_module"]);
    }

    #[test]
    fn missing_file_module_has_no_other_prerequisite() {
        let mut anomalies = ModuleAnomalies::default();
        anomalies.missing_file = true;
        assert!(anomalies.any());
        assert_eq!(anomalies.highest_severity_tier(), Severity::High);
    }

    #[test]
    fn modules_hash_populates_sha256_for_uncompressed_module() {
        use crate::config::Config;
        use crate::context::ScanContext;
        use crate::report::Report;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy.ko");
        fs::write(&path, b"not really an elf object").unwrap();

        let mut config = Config::default();
        config.modules_hash = true;
        let report = Report::new();
        let ctx = ScanContext::new(&config, &report);

        let mut inv = ModuleInventory {
            proc_modules: Vec::new(),
            dep_paths: HashMap::new(),
            builtin: HashSet::new(),
            sysfs: HashSet::new(),
        };
        inv.dep_paths.insert("dummy".to_string(), path);

        let scanner = ModuleScanner;
        let anomalies = scanner.evaluate(&ctx, &inv, "dummy");
        assert!(anomalies.sha256.is_some());
        assert_eq!(anomalies.sha256.as_ref().unwrap().len(), 64);
    }
}
