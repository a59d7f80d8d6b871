//! Auditd rule coverage scanner (spec §4.S; concrete behavior per
//! SPEC_FULL.md §4).
//!
//! Parses `/etc/audit/rules.d/*.rules`, falling back to
//! `/etc/audit/audit.rules`, and checks that execve and privilege-escalation
//! syscalls are covered by an `always,exit` rule.

use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "auditd";
const RULES_DIR: &str = "/etc/audit/rules.d";
const FALLBACK_RULES_FILE: &str = "/etc/audit/audit.rules";

const EXEC_SYSCALLS: &[&str] = &["execve", "execveat"];
const PRIV_ESC_SYSCALLS: &[&str] = &["setuid", "setgid", "setresuid", "setresgid", "capset"];

pub struct AuditdScanner;

impl Scanner for AuditdScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Verifies auditd rule coverage for execve and privilege-escalation syscalls"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let content = load_rules();
        let covered = covered_syscalls(&content);

        let missing_exec: Vec<&str> = EXEC_SYSCALLS.iter().filter(|s| !covered.contains(**s)).copied().collect();
        let exec_severity = if missing_exec.is_empty() { Severity::Info } else { Severity::Medium };
        ctx.report.add_finding(
            NAME,
            Finding::new("execve_coverage", "execve audit coverage", exec_severity, format!("missing={}", missing_exec.join(",")))
                .meta("value", missing_exec.join(",")),
        );

        let missing_priv: Vec<&str> = PRIV_ESC_SYSCALLS.iter().filter(|s| !covered.contains(**s)).copied().collect();
        let priv_severity = if missing_priv.is_empty() { Severity::Info } else { Severity::High };
        ctx.report.add_finding(
            NAME,
            Finding::new("privilege_escalation", "privilege escalation audit coverage", priv_severity, format!("missing={}", missing_priv.join(",")))
                .meta("value", missing_priv.join(",")),
        );
    }
}

fn load_rules() -> String {
    if let Ok(entries) = fs::read_dir(RULES_DIR) {
        let mut files: Vec<_> = entries.flatten().filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("rules")).collect();
        if !files.is_empty() {
            files.sort_by_key(|e| e.file_name());
            return files.iter().filter_map(|e| fs::read_to_string(e.path()).ok()).collect::<Vec<_>>().join("\n");
        }
    }
    fs::read_to_string(FALLBACK_RULES_FILE).unwrap_or_default()
}

/// A syscall is covered when some `-a ... -S <syscall>` rule referencing
/// `always,exit` names it.
fn covered_syscalls(content: &str) -> std::collections::HashSet<String> {
    let mut covered = std::collections::HashSet::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }
        if !trimmed.contains("always,exit") && !trimmed.contains("-a exit,always") {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        for (i, tok) in tokens.iter().enumerate() {
            if *tok == "-S" {
                if let Some(names) = tokens.get(i + 1) {
                    for name in names.split(',') {
                        covered.insert(name.to_string());
                    }
                }
            }
        }
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_execve_when_rule_present() {
        let rules = "-a always,exit -F arch=b64 -S execve,execveat -k exec\n";
        let covered = covered_syscalls(rules);
        assert!(covered.contains("execve"));
        assert!(covered.contains("execveat"));
    }

    #[test]
    fn uncovered_syscall_is_absent() {
        let covered = covered_syscalls("# no rules here\n");
        assert!(!covered.contains("setuid"));
    }

    #[test]
    fn comment_lines_are_ignored() {
        let rules = "# -a always,exit -S execve\n";
        assert!(covered_syscalls(rules).is_empty());
    }
}
