//! Mount option hardening scanner (spec §4.P; concrete behavior per
//! SPEC_FULL.md §4).
//!
//! Parses `/proc/self/mounts` and checks a fixed table of mountpoint
//! prefixes against required mount options, emitting one finding per
//! missing option on a present mountpoint.

use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "mount";

struct MountRule {
    prefix: &'static str,
    required: &'static [&'static str],
    severity: Severity,
}

const RULES: &[MountRule] = &[
    MountRule { prefix: "/tmp", required: &["nosuid", "nodev", "noexec"], severity: Severity::Medium },
    MountRule { prefix: "/home", required: &["nosuid"], severity: Severity::Low },
    MountRule { prefix: "/var/tmp", required: &["nosuid", "nodev", "noexec"], severity: Severity::Medium },
    MountRule { prefix: "/dev/shm", required: &["nosuid", "noexec"], severity: Severity::Medium },
];

struct MountEntry {
    mountpoint: String,
    options: Vec<String>,
}

pub struct MountScanner;

impl Scanner for MountScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Checks mount options against a hardening baseline for sensitive mountpoints"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let content = match fs::read_to_string("/proc/self/mounts") {
            Ok(c) => c,
            Err(_) => return,
        };

        let mounts: Vec<MountEntry> = content.lines().filter_map(parse_mount_line).collect();

        for rule in RULES {
            let entry = mounts.iter().find(|m| m.mountpoint == rule.prefix);
            let Some(entry) = entry else { continue };

            let options_str = entry.options.join(",");
            let missing: Vec<&str> = rule.required.iter().filter(|req| !entry.options.iter().any(|o| o == *req)).copied().collect();

            for missing_opt in &missing {
                ctx.report.add_finding(
                    NAME,
                    Finding::new(
                        format!("{}:{}", rule.prefix, missing_opt),
                        format!("{} missing {missing_opt}", rule.prefix),
                        rule.severity,
                        format!("{} is mounted without {missing_opt} (options: {options_str})", rule.prefix),
                    )
                    .meta("path", rule.prefix)
                    .meta("value", options_str.clone())
                    .meta("status", "missing_option"),
                );
            }

            if missing.is_empty() {
                ctx.report.add_finding(
                    NAME,
                    Finding::new(format!("{}:ok", rule.prefix), format!("{} mount options compliant", rule.prefix), Severity::Info, options_str.clone())
                        .meta("path", rule.prefix)
                        .meta("value", options_str)
                        .meta("status", "ok"),
                );
            }
        }
    }
}

fn parse_mount_line(line: &str) -> Option<MountEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    Some(MountEntry {
        mountpoint: tokens[1].to_string(),
        options: tokens[3].split(',').map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_mount_line() {
        let line = "tmpfs /tmp tmpfs rw,nosuid,nodev 0 0";
        let entry = parse_mount_line(line).unwrap();
        assert_eq!(entry.mountpoint, "/tmp");
        assert!(entry.options.contains(&"nosuid".to_string()));
        assert!(!entry.options.contains(&"noexec".to_string()));
    }

    #[test]
    fn missing_noexec_is_detected() {
        let entry = parse_mount_line("tmpfs /tmp tmpfs rw,nosuid,nodev 0 0").unwrap();
        let rule = RULES.iter().find(|r| r.prefix == "/tmp").unwrap();
        let missing: Vec<&str> = rule.required.iter().filter(|req| !entry.options.iter().any(|o| o == *req)).copied().collect();
        assert_eq!(missing, vec!["noexec"]);
    }
}
