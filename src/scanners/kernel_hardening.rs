//! Kernel hardening posture scanner (spec §4.Q; concrete behavior per
//! SPEC_FULL.md §4).
//!
//! Checks lockdown mode, Secure Boot, IMA policy presence, TPM presence,
//! and a fixed sysctl baseline distinct from `kernel_param`'s general one.

use std::fs;
use std::path::Path;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "kernel_hardening";

pub struct KernelHardeningScanner;

impl Scanner for KernelHardeningScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Checks kernel lockdown, Secure Boot, IMA, TPM, and BPF hardening sysctls"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        self.check_lockdown(ctx);
        self.check_secure_boot(ctx);
        self.check_ima_policy(ctx);
        self.check_tpm(ctx);
        self.check_sysctl(ctx, "kernel.kptr_restrict", "/proc/sys/kernel/kptr_restrict", 1, true);
        self.check_sysctl(ctx, "kernel.dmesg_restrict", "/proc/sys/kernel/dmesg_restrict", 1, false);
        self.check_sysctl(ctx, "kernel.yama.ptrace_scope", "/proc/sys/kernel/yama/ptrace_scope", 1, true);
        self.check_sysctl(ctx, "kernel.unprivileged_bpf_disabled", "/proc/sys/kernel/unprivileged_bpf_disabled", 1, false);
        self.check_sysctl(ctx, "net.core.bpf_jit_harden", "/proc/sys/net/core/bpf_jit_harden", 1, true);
    }
}

impl KernelHardeningScanner {
    fn check_lockdown(&self, ctx: &ScanContext<'_>) {
        let mode = fs::read_to_string("/sys/kernel/security/lockdown").ok().and_then(|s| extract_bracketed(&s));
        let severity = match mode.as_deref() {
            Some("confidentiality") | Some("integrity") => Severity::Info,
            _ => Severity::Medium,
        };
        ctx.report.add_finding(
            NAME,
            Finding::new("lockdown", "Kernel lockdown mode", severity, format!("mode={}", mode.clone().unwrap_or_else(|| "none".to_string())))
                .meta("current", mode.unwrap_or_else(|| "none".to_string())),
        );
    }

    fn check_secure_boot(&self, ctx: &ScanContext<'_>) {
        let efivars_present = Path::new("/sys/firmware/efi/efivars").exists();
        let enabled = efivars_present && secure_boot_enabled();
        let severity = if enabled { Severity::Info } else { Severity::Medium };
        ctx.report.add_finding(NAME, Finding::new("secure_boot", "Secure Boot status", severity, format!("enabled={enabled}")).meta("current", enabled.to_string()));
    }

    fn check_ima_policy(&self, ctx: &ScanContext<'_>) {
        let present = Path::new("/sys/kernel/security/ima/policy").exists();
        let severity = if present { Severity::Info } else { Severity::Low };
        ctx.report.add_finding(NAME, Finding::new("ima_policy", "IMA policy", severity, format!("present={present}")).meta("current", present.to_string()));
    }

    fn check_tpm(&self, ctx: &ScanContext<'_>) {
        let present = Path::new("/sys/class/tpm/tpm0").exists();
        let severity = if present { Severity::Info } else { Severity::Low };
        ctx.report.add_finding(NAME, Finding::new("tpm", "TPM presence", severity, format!("present={present}")).meta("current", present.to_string()));
    }

    fn check_sysctl(&self, ctx: &ScanContext<'_>, id: &str, path: &str, desired_min: i64, at_least: bool) {
        let raw = match fs::read_to_string(path) {
            Ok(r) => r.trim().to_string(),
            Err(_) => return,
        };
        let value: i64 = raw.parse().unwrap_or(-1);
        let compliant = if at_least { value >= desired_min } else { value == desired_min };
        let severity = if compliant { Severity::Info } else { Severity::Medium };

        ctx.report.add_finding(
            NAME,
            Finding::new(id.to_string(), format!("sysctl {id}"), severity, format!("current={value} desired_min={desired_min}"))
                .meta("current", value.to_string())
                .meta("desired", desired_min.to_string()),
        );
    }
}

fn extract_bracketed(content: &str) -> Option<String> {
    let start = content.find('[')?;
    let end = content[start..].find(']')? + start;
    Some(content[start + 1..end].to_string())
}

fn secure_boot_enabled() -> bool {
    let efivars_dir = match fs::read_dir("/sys/firmware/efi/efivars") {
        Ok(d) => d,
        Err(_) => return false,
    };
    for entry in efivars_dir.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("SecureBoot-") {
            if let Ok(data) = fs::read(entry.path()) {
                // First 4 bytes are EFI variable attributes; the status byte follows.
                if let Some(&status) = data.get(4) {
                    return status == 1;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bracketed_lockdown_mode() {
        assert_eq!(extract_bracketed("none [integrity] confidentiality\n"), Some("integrity".to_string()));
    }

    #[test]
    fn no_brackets_returns_none() {
        assert_eq!(extract_bracketed("none\n"), None);
    }
}
