//! Indicator-of-compromise heuristic scanner (spec §4.K).
//!
//! Scans `/proc` for suspicious executable paths, deleted-on-disk mappings,
//! world-writable-exec targets, and loader environment abuse (`LD_PRELOAD`,
//! `LD_LIBRARY_PATH`). Purely substring-based — no regex — and aggregated
//! by effective key so a single offending binary produces one finding.

use std::collections::HashMap;
use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "ioc";
const MAX_PROC_ENTRIES: usize = 1000;
const MAX_ENV_ENTRIES: usize = 500;
const CMD_TRUNCATE_BYTES: usize = 512;
const EXE_KEY_TRUNCATE_BYTES: usize = 1024;
const ENV_TRUNCATE_BYTES: usize = 2048;

const PATH_MARKERS: &[&str] = &["/tmp/", "/dev/shm/", "/var/tmp/", "/home/"];
const NAME_MARKERS: &[&str] = &["kworker", "cryptominer", "xmrig", "minerd", "kthreadd", "malware", "bot"];

struct AggregateEntry {
    pids: Vec<u32>,
    deleted: bool,
    world_writable_exec: bool,
    pattern_match: bool,
}

pub struct IocScanner;

impl Scanner for IocScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Heuristic scan of /proc for suspicious exe paths, deleted mappings, and loader env abuse"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let allow = collect_allow_list(ctx);
        let mut aggregates: HashMap<String, AggregateEntry> = HashMap::new();
        let mut env_emitted = 0usize;

        let entries = match fs::read_dir("/proc") {
            Ok(e) => e,
            Err(_) => return,
        };

        for (scanned, entry) in entries.flatten().enumerate() {
            if scanned >= MAX_PROC_ENTRIES {
                break;
            }
            let pid: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                Some(pid) => pid,
                None => continue,
            };

            let proc_dir = entry.path();
            let cmdline_raw = fs::read(proc_dir.join("cmdline")).unwrap_or_default();
            let mut cmdline: String = cmdline_raw.iter().map(|&b| if b == 0 { ' ' } else { b as char }).collect();
            truncate_at_char_boundary(&mut cmdline, CMD_TRUNCATE_BYTES);

            let exe_target = fs::read_link(proc_dir.join("exe")).ok().map(|p| p.to_string_lossy().into_owned());

            let mut key = exe_target.clone().unwrap_or_else(|| cmdline.clone());
            truncate_at_char_boundary(&mut key, EXE_KEY_TRUNCATE_BYTES);

            let pattern_match = PATH_MARKERS.iter().any(|m| cmdline.contains(m)) || NAME_MARKERS.iter().any(|m| cmdline.contains(m));
            let deleted = exe_target.as_deref().map(|t| t.contains("(deleted)")).unwrap_or(false);
            let world_writable_exec = exe_target
                .as_deref()
                .map(|t| t.starts_with("/tmp") || t.starts_with("/dev/shm") || t.starts_with("/var/tmp"))
                .unwrap_or(false);

            if deleted || world_writable_exec || pattern_match {
                let entry = aggregates.entry(key).or_insert_with(|| AggregateEntry {
                    pids: Vec::new(),
                    deleted: false,
                    world_writable_exec: false,
                    pattern_match: false,
                });
                if entry.pids.len() < 10 {
                    entry.pids.push(pid);
                }
                entry.deleted |= deleted;
                entry.world_writable_exec |= world_writable_exec;
                entry.pattern_match |= pattern_match;
            }

            if env_emitted < MAX_ENV_ENTRIES {
                if let Ok(mut env_raw) = fs::read(proc_dir.join("environ")) {
                    env_raw.truncate(ENV_TRUNCATE_BYTES);
                    let env = String::from_utf8_lossy(&env_raw);
                    if env.contains("LD_PRELOAD=") || env.contains("LD_LIBRARY_PATH=") {
                        if !is_allowed(&key, &allow) {
                            let mut description = format!("pid {pid} sets a loader environment override");
                            if env.contains("/tmp/") || env.contains("/dev/shm/") {
                                description.push_str(" referencing a world-writable path");
                            }
                            ctx.report.add_finding(NAME, Finding::new(format!("{key}:env"), "Loader environment override", Severity::Medium, description));
                            env_emitted += 1;
                        }
                    }
                }
            }
        }

        for (key, entry) in &aggregates {
            if is_allowed(key, &allow) {
                continue;
            }

            // world_writable_exec and pattern_match both carry High severity
            // (spec §4.K); only `deleted` ranks above them.
            let severity = if entry.deleted { Severity::Critical } else { Severity::High };

            let mut finding = Finding::new(
                format!("{key}:proc_ioc"),
                "Suspicious process indicator",
                severity,
                format!("{} matching process(es) aggregated under {key}", entry.pids.len()),
            )
            .meta("pid_count", entry.pids.len().to_string());

            if entry.deleted {
                finding = finding.meta("deleted_exe", "true");
            }
            if entry.world_writable_exec {
                finding = finding.meta("world_writable_exec", "true");
            }
            if entry.pattern_match {
                finding = finding.meta("pattern_match", "true");
            }

            ctx.report.add_finding(NAME, finding);
        }
    }
}

fn collect_allow_list(ctx: &ScanContext<'_>) -> Vec<String> {
    let mut allow = ctx.config.ioc_allow.clone();
    if let Some(path) = &ctx.config.ioc_allow_file {
        if let Ok(content) = fs::read_to_string(path) {
            allow.extend(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
        }
    }
    allow
}

fn is_allowed(key: &str, allow: &[String]) -> bool {
    allow.iter().any(|pattern| key.contains(pattern.as_str()))
}

/// Truncates `s` to at most `max_bytes`, backing off to the nearest char
/// boundary instead of panicking — `cmdline`/`environ` bytes may contain
/// multi-byte UTF-8 sequences that land mid-char at an arbitrary cap.
fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    s.truncate(idx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_match_detects_tmp_path() {
        let cmdline = "/tmp/whatever --flag";
        assert!(PATH_MARKERS.iter().any(|m| cmdline.contains(m)));
    }

    #[test]
    fn pattern_match_detects_known_names() {
        let cmdline = "./xmrig --donate-level=0";
        assert!(NAME_MARKERS.iter().any(|m| cmdline.contains(m)));
    }

    #[test]
    fn allow_list_suppresses_by_substring() {
        let allow = vec!["nvidia".to_string()];
        assert!(is_allowed("/tmp/nvidia-helper (deleted)", &allow));
        assert!(!is_allowed("/tmp/other (deleted)", &allow));
    }

    #[test]
    fn truncate_at_char_boundary_never_panics_mid_multibyte_char() {
        // Every 0xFF byte maps to U+00FF, a 2-byte UTF-8 sequence, so a naive
        // byte-length truncate at an odd offset would split one in half.
        let mut s: String = std::iter::repeat('\u{FF}').take(10).collect();
        truncate_at_char_boundary(&mut s, 5);
        assert!(s.len() <= 5);
        assert!(s.chars().all(|c| c == '\u{FF}'));
    }

    #[test]
    fn truncate_at_char_boundary_is_a_noop_when_already_short_enough() {
        let mut s = "short".to_string();
        truncate_at_char_boundary(&mut s, 512);
        assert_eq!(s, "short");
    }
}
