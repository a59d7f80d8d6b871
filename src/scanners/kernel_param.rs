//! Kernel sysctl parameter scanner (spec §4.N).
//!
//! Compares a fixed list of `/proc/sys/...` values against a desired
//! baseline. A mismatch is reported at a per-item severity; a read failure
//! is a warning, not a finding.

use std::fs;

use crate::context::ScanContext;
use crate::finding::{DiagnosticCode, Finding};
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "kernel_param";

struct BaselineParam {
    path: &'static str,
    desired: &'static str,
    mismatch_severity: Severity,
}

const BASELINE: &[BaselineParam] = &[
    BaselineParam { path: "/proc/sys/kernel/randomize_va_space", desired: "2", mismatch_severity: Severity::Medium },
    BaselineParam { path: "/proc/sys/kernel/kptr_restrict", desired: "1", mismatch_severity: Severity::Low },
    BaselineParam { path: "/proc/sys/kernel/dmesg_restrict", desired: "1", mismatch_severity: Severity::Low },
    BaselineParam { path: "/proc/sys/net/ipv4/conf/all/rp_filter", desired: "1", mismatch_severity: Severity::Medium },
    BaselineParam { path: "/proc/sys/net/ipv4/tcp_syncookies", desired: "1", mismatch_severity: Severity::Medium },
    BaselineParam { path: "/proc/sys/net/ipv4/ip_forward", desired: "0", mismatch_severity: Severity::Low },
    BaselineParam { path: "/proc/sys/fs/protected_hardlinks", desired: "1", mismatch_severity: Severity::Medium },
    BaselineParam { path: "/proc/sys/fs/protected_symlinks", desired: "1", mismatch_severity: Severity::Medium },
    BaselineParam { path: "/proc/sys/fs/suid_dumpable", desired: "0", mismatch_severity: Severity::Medium },
];

pub struct KernelParamScanner;

impl Scanner for KernelParamScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Compares sysctl values against a hardening baseline"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        for param in BASELINE {
            let current = match fs::read_to_string(param.path) {
                Ok(c) => c.trim().to_string(),
                Err(_) => {
                    ctx.report.add_warning(NAME, DiagnosticCode::ParamUnreadable, format!("{}: unreadable", param.path));
                    continue;
                }
            };

            let matches = current == param.desired;
            let severity = if matches { Severity::Info } else { param.mismatch_severity };

            let mut finding = Finding::new(param.path.to_string(), format!("sysctl {}", param.path), severity, format!("current={current} desired={}", param.desired))
                .meta("current", current.clone())
                .meta("desired", param.desired);
            if !matches {
                finding = finding.meta("status", "mismatch");
            }

            ctx.report.add_finding(NAME, finding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_has_no_duplicate_paths() {
        let mut seen = std::collections::HashSet::new();
        for p in BASELINE {
            assert!(seen.insert(p.path), "duplicate baseline path {}", p.path);
        }
    }
}
