//! Scanner implementations, one module per host-posture component (spec §4).
//!
//! Every scanner implements the [`Scanner`] trait (declared in
//! [`crate::registry`]) and is registered in a fixed order by
//! [`crate::registry::ScannerRegistry::register_all_default`].

pub mod auditd;
pub mod container;
pub mod ebpf;
pub mod integrity;
pub mod ioc;
pub mod kernel_hardening;
pub mod kernel_param;
pub mod mac;
pub mod modules;
pub mod mount;
pub mod network;
pub mod process;
pub mod suid;
pub mod systemd;
pub mod world_writable;
pub mod yara;

/// Returns `true` if an executable named `cmd` exists on `PATH`.
///
/// On Unix the file must also have an executable permission bit set.
pub fn which_exists(cmd: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path).any(|dir| {
                let candidate = dir.join(cmd);
                if !candidate.is_file() {
                    return false;
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::metadata(&candidate)
                        .map(|m| m.permissions().mode() & 0o111 != 0)
                        .unwrap_or(false)
                }
                #[cfg(not(unix))]
                {
                    true
                }
            })
        })
        .unwrap_or(false)
}
