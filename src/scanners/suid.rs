//! SUID/SGID aggregation scanner (spec §4.L).
//!
//! Walks the standard system binary roots, groups regular files carrying
//! the SUID or SGID bit by `(dev, inode)`, and emits one finding per
//! distinct binary with any additional hardlinked paths recorded as
//! `alt_paths`.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::context::ScanContext;
use crate::finding::{DiagnosticCode, Finding};
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "suid";
const SUID_ROOTS: &[&str] = &["/bin", "/sbin", "/usr/bin", "/usr/sbin", "/usr/local/bin", "/usr/local/sbin"];
const MAX_ALT_PATHS: usize = 5;

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;

const EXPECTED_BASELINE: &[&str] = &[
    "/usr/bin/sudo",
    "/usr/bin/su",
    "/usr/bin/passwd",
    "/usr/bin/chsh",
    "/usr/bin/chfn",
    "/usr/bin/gpasswd",
    "/usr/bin/newgrp",
    "/usr/bin/mount",
    "/usr/bin/umount",
    "/usr/bin/ping",
    "/usr/bin/pkexec",
];

struct InodeGroup {
    primary: PathBuf,
    alt_paths: Vec<PathBuf>,
}

pub struct SuidScanner;

impl Scanner for SuidScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Aggregates SUID/SGID binaries by inode across the standard system binary roots"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let expected = build_expected_set(ctx);
        let mut groups: HashMap<(u64, u64), InodeGroup> = HashMap::new();

        for root in SUID_ROOTS {
            let walker = WalkDir::new(root).into_iter();
            for entry in walker {
                match entry {
                    Ok(entry) => {
                        if !entry.file_type().is_file() {
                            continue;
                        }
                        let meta = match entry.metadata() {
                            Ok(m) => m,
                            Err(_) => continue,
                        };
                        let mode = meta.mode();
                        if mode & (S_ISUID | S_ISGID) == 0 {
                            continue;
                        }

                        let key = (meta.dev(), meta.ino());
                        groups
                            .entry(key)
                            .and_modify(|g| {
                                if g.alt_paths.len() < MAX_ALT_PATHS {
                                    g.alt_paths.push(entry.path().to_path_buf());
                                }
                            })
                            .or_insert_with(|| InodeGroup {
                                primary: entry.path().to_path_buf(),
                                alt_paths: Vec::new(),
                            });
                    }
                    Err(e) => {
                        ctx.report.add_warning(NAME, DiagnosticCode::WalkError, format!("{root}: {e}"));
                        break;
                    }
                }
            }
        }

        for group in groups.values() {
            let primary_str = group.primary.to_string_lossy();

            let mut severity = Severity::Medium;
            if primary_str.contains("/usr/local/") {
                severity = Severity::High;
            }
            if primary_str.contains("/tmp/") {
                severity = Severity::Critical;
            }

            let mut expected_flag = false;
            if expected.contains(primary_str.as_ref()) {
                expected_flag = true;
                severity = Severity::Low;
            }

            let mut finding = Finding::new(primary_str.to_string(), format!("SUID/SGID binary: {primary_str}"), severity, primary_str.to_string());

            if !group.alt_paths.is_empty() {
                let mut alt: Vec<String> = group.alt_paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
                let truncated = group.alt_paths.len() >= MAX_ALT_PATHS;
                if truncated {
                    alt.push("...".to_string());
                }
                finding = finding.meta("alt_paths", alt.join(",")).meta("alt_path_count", group.alt_paths.len().to_string());
            }
            if expected_flag {
                finding = finding.meta("expected", "true");
            }

            ctx.report.add_finding(NAME, finding);
        }
    }
}

fn build_expected_set(ctx: &ScanContext<'_>) -> std::collections::HashSet<String> {
    let mut set: std::collections::HashSet<String> = EXPECTED_BASELINE.iter().map(|s| s.to_string()).collect();
    set.extend(ctx.config.suid_expected_add.iter().cloned());
    if let Some(path) = &ctx.config.suid_expected_file {
        if let Ok(content) = std::fs::read_to_string(path) {
            set.extend(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_bumps_to_critical() {
        let path = "/tmp/sudo";
        let mut severity = Severity::Medium;
        if path.contains("/usr/local/") {
            severity = Severity::High;
        }
        if path.contains("/tmp/") {
            severity = Severity::Critical;
        }
        assert_eq!(severity, Severity::Critical);
    }

    #[test]
    fn usr_local_bumps_to_high() {
        let path = "/usr/local/bin/weird-suid";
        let mut severity = Severity::Medium;
        if path.contains("/usr/local/") {
            severity = Severity::High;
        }
        assert_eq!(severity, Severity::High);
    }

    #[test]
    fn expected_baseline_contains_sudo() {
        assert!(EXPECTED_BASELINE.contains(&"/usr/bin/sudo"));
    }
}
