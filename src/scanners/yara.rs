//! YARA rule-matching scanner (spec §4.V).
//!
//! Gated behind the `yara-scan` cargo feature, consistent with the
//! teacher's pattern for external-tool scanners (`shellcheck`, `semgrep`,
//! `secrets`): when the optional matcher is not linked, this scanner
//! reports itself unavailable and returns without emitting findings.

use crate::context::ScanContext;
use crate::registry::Scanner;

const NAME: &str = "yara";

#[cfg(feature = "yara-scan")]
const SCAN_ROOTS: &[&str] = &["/tmp", "/dev/shm", "/var/tmp"];

pub struct YaraScanner;

impl Scanner for YaraScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Matches compiled YARA rules against selected filesystem roots (requires the yara-scan feature)"
    }

    #[cfg(not(feature = "yara-scan"))]
    fn scan(&self, ctx: &ScanContext<'_>) {
        ctx.report.add_warning(NAME, crate::finding::DiagnosticCode::Unknown, "yara-scan feature not enabled; scanner skipped");
    }

    #[cfg(feature = "yara-scan")]
    fn scan(&self, ctx: &ScanContext<'_>) {
        let rules_dir = match &ctx.config.rules_dir {
            Some(dir) => dir.clone(),
            None => {
                ctx.report.add_warning(NAME, crate::finding::DiagnosticCode::Unknown, "no rules_dir configured for yara scanner");
                return;
            }
        };

        let compiler = match yara::Compiler::new() {
            Ok(c) => c,
            Err(e) => {
                ctx.report.add_error(NAME, crate::finding::DiagnosticCode::Unknown, format!("yara compiler init failed: {e}"));
                return;
            }
        };

        let compiler = match compiler.add_rules_file(&rules_dir) {
            Ok(c) => c,
            Err(e) => {
                ctx.report.add_error(NAME, crate::finding::DiagnosticCode::Unknown, format!("yara rules load failed: {e}"));
                return;
            }
        };

        let rules = match compiler.compile_rules() {
            Ok(r) => r,
            Err(e) => {
                ctx.report.add_error(NAME, crate::finding::DiagnosticCode::Unknown, format!("yara compile failed: {e}"));
                return;
            }
        };

        for root in SCAN_ROOTS {
            for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let Ok(results) = rules.scan_file(path, 10) else { continue };
                for m in results {
                    let path_str = path.to_string_lossy();
                    ctx.report.add_finding(
                        NAME,
                        crate::finding::Finding::new(
                            format!("{path_str}:{}", m.identifier),
                            format!("YARA match: {}", m.identifier),
                            crate::severity::Severity::Medium,
                            format!("{path_str} matched rule {}", m.identifier),
                        )
                        .meta("path", path_str.to_string())
                        .meta("rule", m.identifier),
                    );
                }
            }
        }
    }
}
