//! World-writable file and filesystem-hygiene scanner (spec §4.M).
//!
//! Phase one sweeps for world-writable regular files across common
//! directories; phase two (`fs_hygiene`) adds PATH-directory, setuid
//! interpreter, file-capability, and dangling-SUID-hardlink checks.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "world_writable";
const MAX_PER_DIR: usize = 5000;
const MAX_TOTAL: usize = 20000;
const S_IWOTH: u32 = 0o002;
const S_ISUID: u32 = 0o4000;

const SWEEP_ROOTS: &[&str] = &["/bin", "/sbin", "/usr/bin", "/usr/sbin", "/usr/local/bin", "/etc", "/opt", "/srv"];
const SETUID_INTERPRETERS: &[&str] = &["bash", "sh", "dash", "zsh", "ksh", "python", "python3", "perl", "ruby"];
const HARDLINK_SYSTEM_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin"];
const HARDLINK_TEMP_DIRS: &[&str] = &["/tmp", "/var/tmp", "/dev/shm"];

pub struct WorldWritableScanner;

impl Scanner for WorldWritableScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Finds world-writable files and filesystem-hygiene violations (PATH, setuid interpreters, dangling SUID hardlinks)"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        self.sweep_world_writable(ctx);

        if ctx.config.fs_hygiene {
            self.check_path_dirs(ctx);
            let suid_inodes = self.check_setuid_interpreters(ctx);
            self.check_file_capabilities(ctx);
            self.check_dangling_hardlinks(ctx, &suid_inodes);
        }
    }
}

impl WorldWritableScanner {
    fn sweep_world_writable(&self, ctx: &ScanContext<'_>) {
        let mut total = 0usize;
        let limit = if ctx.config.fs_world_writable_limit > 0 {
            ctx.config.fs_world_writable_limit as usize
        } else {
            MAX_TOTAL
        };

        let roots: Vec<String> = if ctx.config.world_writable_dirs.is_empty() {
            SWEEP_ROOTS.iter().map(|s| s.to_string()).collect()
        } else {
            ctx.config.world_writable_dirs.clone()
        };

        'roots: for root in &roots {
            let mut per_dir = 0usize;
            for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if total >= limit || total >= MAX_TOTAL || per_dir >= MAX_PER_DIR {
                    continue 'roots;
                }
                if !entry.file_type().is_file() {
                    continue;
                }
                let path_str = entry.path().to_string_lossy();
                if ctx.config.world_writable_exclude.iter().any(|ex| path_str.contains(ex.as_str())) {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if meta.mode() & S_IWOTH == 0 {
                    continue;
                }

                let mut severity = Severity::Medium;
                if path_str.contains("/tmp/") {
                    severity = Severity::Low;
                }
                if path_str.ends_with(".so") || path_str.contains("/bin/") {
                    severity = Severity::High;
                }

                ctx.report.add_finding(
                    NAME,
                    Finding::new(path_str.to_string(), "World-writable file", severity, path_str.to_string()).meta("path", path_str.to_string()),
                );
                total += 1;
                per_dir += 1;
            }
        }
    }

    fn check_path_dirs(&self, ctx: &ScanContext<'_>) {
        let path_var = std::env::var("PATH").unwrap_or_default();
        for dir in path_var.split(':').filter(|d| !d.is_empty()) {
            if let Ok(meta) = std::fs::metadata(dir) {
                if meta.mode() & S_IWOTH != 0 {
                    ctx.report.add_finding(
                        NAME,
                        Finding::new(format!("{dir}:path_dir_world_writable"), "World-writable PATH directory", Severity::High, dir.to_string())
                            .meta("path", dir.to_string())
                            .meta("rule", "path_dir_world_writable"),
                    );
                }
            }
        }
    }

    /// Returns the set of `(dev, inode)` pairs flagged as setuid interpreters,
    /// for use by the dangling-hardlink check.
    fn check_setuid_interpreters(&self, ctx: &ScanContext<'_>) -> HashMap<(u64, u64), PathBuf> {
        let mut inodes = HashMap::new();
        for root in &["/usr/bin", "/bin", "/usr/local/bin"] {
            for entry in WalkDir::new(root).max_depth(1).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if meta.mode() & S_ISUID == 0 {
                    continue;
                }

                let filename = entry.file_name().to_string_lossy().to_string();
                let name_hit = SETUID_INTERPRETERS.contains(&filename.as_str());
                let shebang_hit = reads_shebang_interpreter(entry.path());

                if name_hit || shebang_hit {
                    let path_str = entry.path().to_string_lossy();
                    ctx.report.add_finding(
                        NAME,
                        Finding::new(format!("{path_str}:setuid_interpreter"), "Setuid interpreter", Severity::Critical, path_str.to_string())
                            .meta("path", path_str.to_string())
                            .meta("rule", "setuid_interpreter"),
                    );
                    inodes.insert((meta.dev(), meta.ino()), entry.path().to_path_buf());
                }
            }
        }
        inodes
    }

    fn check_file_capabilities(&self, ctx: &ScanContext<'_>) {
        for root in &["/usr/bin", "/bin", "/usr/sbin", "/sbin"] {
            for entry in WalkDir::new(root).max_depth(1).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if meta.mode() & S_ISUID != 0 {
                    continue;
                }
                if has_file_capability(entry.path()) {
                    let path_str = entry.path().to_string_lossy();
                    ctx.report.add_finding(
                        NAME,
                        Finding::new(format!("{path_str}:file_capability"), "File capability set", Severity::Medium, path_str.to_string())
                            .meta("path", path_str.to_string())
                            .meta("rule", "file_capability"),
                    );
                }
            }
        }
    }

    fn check_dangling_hardlinks(&self, ctx: &ScanContext<'_>, _suid_inodes: &HashMap<(u64, u64), PathBuf>) {
        let mut by_inode: HashMap<(u64, u64), Vec<PathBuf>> = HashMap::new();
        let all_roots: Vec<&str> = HARDLINK_SYSTEM_DIRS.iter().chain(HARDLINK_TEMP_DIRS.iter()).copied().collect();

        for root in all_roots {
            for entry in WalkDir::new(root).max_depth(1).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if meta.nlink() < 2 {
                    continue;
                }
                by_inode.entry((meta.dev(), meta.ino())).or_default().push(entry.path().to_path_buf());
            }
        }

        for paths in by_inode.values() {
            if paths.len() < 2 {
                continue;
            }
            let has_system = paths.iter().any(|p| HARDLINK_SYSTEM_DIRS.iter().any(|d| p.starts_with(d)));
            let has_temp = paths.iter().any(|p| HARDLINK_TEMP_DIRS.iter().any(|d| p.starts_with(d)));
            if has_system && has_temp {
                let joined = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>().join(",");
                ctx.report.add_finding(
                    NAME,
                    Finding::new(format!("{joined}:dangling_suid_hardlink"), "Dangling SUID hardlink", Severity::High, joined.clone())
                        .meta("paths", joined)
                        .meta("rule", "dangling_suid_hardlink"),
                );
            }
        }
    }
}

fn reads_shebang_interpreter(path: &Path) -> bool {
    use std::io::Read;
    let mut buf = [0u8; 128];
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let n = file.read(&mut buf).unwrap_or(0);
    let head = String::from_utf8_lossy(&buf[..n]);
    if !head.starts_with("#!") {
        return false;
    }
    SETUID_INTERPRETERS.iter().any(|interp| head.contains(interp))
}

fn has_file_capability(path: &Path) -> bool {
    #[cfg(target_os = "linux")]
    {
        match xattr_get(path, "security.capability") {
            Some(v) => !v.is_empty(),
            None => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = path;
        false
    }
}

#[cfg(target_os = "linux")]
fn xattr_get(path: &Path, name: &str) -> Option<Vec<u8>> {
    use std::ffi::CString;
    let c_path = CString::new(path.as_os_str().as_encoded_bytes()).ok()?;
    let c_name = CString::new(name).ok()?;
    let mut buf = vec![0u8; 256];
    let ret = unsafe { libc::getxattr(c_path.as_ptr(), c_name.as_ptr(), buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if ret < 0 {
        return None;
    }
    buf.truncate(ret as usize);
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shebang_detection_matches_python() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner");
        std::fs::write(&path, b"#!/usr/bin/env python3\nprint('x')\n").unwrap();
        assert!(reads_shebang_interpreter(&path));
    }

    #[test]
    fn non_shebang_file_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"just text").unwrap();
        assert!(!reads_shebang_interpreter(&path));
    }

    #[test]
    fn setuid_interpreter_names_cover_common_shells() {
        assert!(SETUID_INTERPRETERS.contains(&"bash"));
        assert!(SETUID_INTERPRETERS.contains(&"python3"));
    }
}
