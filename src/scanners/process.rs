//! Process inventory scanner (spec §4.H).
//!
//! Walks `/proc/<pid>`, filtering kernel threads unless `all_processes` is
//! set, and emits one Info finding per surviving process with uid/gid and
//! optionally an executable hash and container attribution.

use std::fs;
use std::path::Path;

use crate::context::ScanContext;
use crate::finding::{DiagnosticCode, Finding};
use crate::helpers::hash::sha256_capped;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "process";
const PROC_HASH_CAP_BYTES: u64 = 1024 * 1024;

pub struct ProcessScanner;

impl Scanner for ProcessScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Enumerates /proc/<pid>, emitting uid/gid, exe hash, and container attribution"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let entries = match fs::read_dir("/proc") {
            Ok(entries) => entries,
            Err(e) => {
                ctx.report.add_error(NAME, DiagnosticCode::Unknown, format!("/proc unreadable: {e}"));
                return;
            }
        };

        let mut emitted = 0usize;
        for entry in entries.flatten() {
            let pid = match entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
                Some(pid) => pid,
                None => continue,
            };

            if ctx.config.max_processes > 0 && emitted as i64 >= ctx.config.max_processes {
                break;
            }

            if self.scan_one(ctx, pid) {
                emitted += 1;
            }
        }
    }
}

impl ProcessScanner {
    /// Returns `true` if a finding was emitted for `pid`.
    fn scan_one(&self, ctx: &ScanContext<'_>, pid: u32) -> bool {
        let proc_dir = Path::new("/proc").join(pid.to_string());

        let status_raw = match fs::read_to_string(proc_dir.join("status")) {
            Ok(s) => s,
            Err(_) => {
                ctx.report.add_warning(NAME, DiagnosticCode::ProcUnreadableStatus, format!("pid {pid}: status unreadable"));
                return false;
            }
        };
        let cmdline_raw = match fs::read(proc_dir.join("cmdline")) {
            Ok(c) => c,
            Err(_) => {
                ctx.report.add_warning(NAME, DiagnosticCode::ProcUnreadableCmdline, format!("pid {pid}: cmdline unreadable"));
                return false;
            }
        };

        let cmdline = String::from_utf8_lossy(&cmdline_raw)
            .replace('\0', " ")
            .trim()
            .to_string();

        if !ctx.config.all_processes {
            let looks_like_kthread = cmdline.is_empty()
                || (cmdline_raw.first() == Some(&b'[') && cmdline_raw.last() == Some(&b']'));
            if looks_like_kthread {
                return false;
            }
        }

        let (uid, gid) = parse_status_ids(&status_raw);

        if !ctx.config.process_inventory {
            return false;
        }

        let mut finding = Finding::new(format!("proc:{pid}"), format!("Process {pid}"), Severity::Info, cmdline.clone())
            .meta("uid", uid.unwrap_or_default())
            .meta("gid", gid.unwrap_or_default());

        let exe_path = fs::read_link(proc_dir.join("exe"));
        match &exe_path {
            Ok(target) => {
                finding = finding.meta("exe_path", target.to_string_lossy());
            }
            Err(_) => {
                ctx.report.add_warning(NAME, DiagnosticCode::ProcExeSymlinkUnreadable, format!("pid {pid}: exe symlink unreadable"));
            }
        }

        if ctx.config.process_hash {
            let hash = exe_path
                .as_ref()
                .ok()
                .and_then(|p| sha256_capped(p, PROC_HASH_CAP_BYTES).ok())
                .unwrap_or_else(|| "sha256_unavailable".to_string());
            finding = finding.meta("sha256", hash);
        }

        let mut container_id = None;
        if ctx.config.containers {
            container_id = container_id_for_pid(pid);
            if let Some(cid) = &container_id {
                finding = finding.meta("container_id", cid.clone());
            }
            if let Some(filter) = &ctx.config.container_id_filter {
                if !filter.is_empty() && container_id.as_deref() != Some(filter.as_str()) {
                    return false;
                }
            }
        }

        ctx.report.add_finding(NAME, finding);
        true
    }
}

fn parse_status_ids(status: &str) -> (Option<String>, Option<String>) {
    let mut uid = None;
    let mut gid = None;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("Uid:") {
            uid = rest.split_whitespace().next().map(str::to_string);
        } else if let Some(rest) = line.strip_prefix("Gid:") {
            gid = rest.split_whitespace().next().map(str::to_string);
        }
    }
    (uid, gid)
}

/// Extracts a container id from `/proc/<pid>/cgroup`: the first 64- or
/// 32-hex-char token found, truncated to 12 chars (spec §4.H, glossary).
pub(crate) fn container_id_for_pid(pid: u32) -> Option<String> {
    let path = Path::new("/proc").join(pid.to_string()).join("cgroup");
    let content = fs::read_to_string(path).ok()?;
    extract_container_id(&content)
}

pub(crate) fn extract_container_id(cgroup_content: &str) -> Option<String> {
    for line in cgroup_content.lines() {
        for token in line.split(|c: char| !c.is_ascii_hexdigit()) {
            if token.len() == 64 || token.len() == 32 {
                return Some(token[..12].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uid_gid_from_status() {
        let status = "Name:\tbash\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\t1000\t1000\t1000\n";
        let (uid, gid) = parse_status_ids(status);
        assert_eq!(uid.as_deref(), Some("1000"));
        assert_eq!(gid.as_deref(), Some("1000"));
    }

    #[test]
    fn extracts_64_hex_container_id() {
        let cgroup = "12:pids:/docker/abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789\n";
        let id = extract_container_id(cgroup).unwrap();
        assert_eq!(id.len(), 12);
        assert_eq!(id, "abcdef012345");
    }

    #[test]
    fn no_hex_token_yields_none() {
        assert!(extract_container_id("0::/init.scope\n").is_none());
    }
}
