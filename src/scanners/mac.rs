//! Mandatory access control posture scanner (spec §4.O).
//!
//! Reports SELinux and AppArmor presence/mode, counts unconfined processes
//! among a hardcoded list of security-critical daemons, and emits a
//! combined `mac_none`/`mac_dual` advisory.

use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "mac";
const CRITICAL_BINARIES: &[&str] = &["sshd", "dbus-daemon", "nginx", "containerd", "dockerd"];

pub struct MacScanner;

impl Scanner for MacScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Reports SELinux/AppArmor presence and unconfined critical processes"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let in_container = std::path::Path::new("/.dockerenv").exists() || std::path::Path::new("/run/.containerenv").exists();

        let selinux = detect_selinux();
        let apparmor = detect_apparmor();

        ctx.report.add_finding(
            NAME,
            Finding::new("selinux", "SELinux status", if selinux.is_some() { Severity::Info } else { Severity::Low }, selinux_description(&selinux))
                .meta("status", selinux.clone().unwrap_or_else(|| "absent".to_string())),
        );

        ctx.report.add_finding(
            NAME,
            Finding::new("apparmor", "AppArmor status", if apparmor { Severity::Info } else { Severity::Low }, format!("enabled={apparmor}"))
                .meta("status", apparmor.to_string()),
        );

        let unconfined = count_unconfined(CRITICAL_BINARIES);

        let has_any_mac = selinux.is_some() || apparmor;
        let mut none_severity = Severity::High;
        if in_container {
            none_severity = Severity::Medium;
        }

        if !has_any_mac {
            ctx.report.add_finding(NAME, Finding::new("mac_none", "No MAC system active", none_severity, "neither SELinux nor AppArmor is active").meta("pid_count", unconfined.to_string()));
        } else if selinux.is_some() && apparmor {
            ctx.report.add_finding(NAME, Finding::new("mac_dual", "Multiple MAC systems active", Severity::Low, "both SELinux and AppArmor appear active"));
        }
    }
}

fn selinux_description(status: &Option<String>) -> String {
    match status {
        Some(s) => format!("selinux enforce={s}"),
        None => "selinux not present".to_string(),
    }
}

fn detect_selinux() -> Option<String> {
    if let Ok(content) = fs::read_to_string("/sys/fs/selinux/enforce") {
        let trimmed = content.trim();
        if trimmed == "1" || trimmed == "0" {
            return Some(trimmed.to_string());
        }
    }
    if fs::read_to_string("/etc/selinux/config").is_ok() {
        return Some("configured".to_string());
    }
    None
}

fn detect_apparmor() -> bool {
    fs::read_to_string("/sys/module/apparmor/parameters/enabled")
        .map(|s| s.trim() == "Y")
        .unwrap_or(false)
}

/// Counts how many of `binaries` appear to run unconfined, by reading
/// `/proc/<pid>/attr/current` for matching command names.
fn count_unconfined(binaries: &[&str]) -> usize {
    let mut count = 0;
    let entries = match fs::read_dir("/proc") {
        Ok(e) => e,
        Err(_) => return 0,
    };
    for entry in entries.flatten() {
        let pid_dir = entry.path();
        let comm = fs::read_to_string(pid_dir.join("comm")).unwrap_or_default();
        let comm = comm.trim();
        if !binaries.contains(&comm) {
            continue;
        }
        let label = fs::read_to_string(pid_dir.join("attr/current")).unwrap_or_default();
        if label.trim().is_empty() || label.contains("unconfined") {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_binaries_includes_sshd() {
        assert!(CRITICAL_BINARIES.contains(&"sshd"));
    }

    #[test]
    fn selinux_description_absent_case() {
        assert_eq!(selinux_description(&None), "selinux not present");
    }
}
