//! Container attribution scanner (spec §4.T).
//!
//! Standalone wrapper around the same cgroup-path extraction the process
//! and network scanners use internally: reports the current host's own
//! container identity (from this process's own cgroup) and runtime.

use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::scanners::process::extract_container_id;
use crate::severity::Severity;

const NAME: &str = "container";

pub struct ContainerScanner;

impl Scanner for ContainerScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Derives the host's own container id and runtime from its cgroup path"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let cgroup_content = fs::read_to_string("/proc/self/cgroup").unwrap_or_default();
        let container_id = extract_container_id(&cgroup_content);

        match container_id {
            Some(id) => {
                let runtime = detect_runtime(&cgroup_content);
                ctx.report.add_finding(
                    NAME,
                    Finding::new(format!("container:{id}"), "Container identity", Severity::Info, format!("container_id={id} runtime={runtime}"))
                        .meta("container_id", id)
                        .meta("runtime", runtime)
                        .meta("cgroup", cgroup_content.lines().next().unwrap_or("").to_string()),
                );
            }
            None => {
                ctx.report.add_finding(NAME, Finding::new("container:none", "No container detected", Severity::Info, "host does not appear to be running inside a container"));
            }
        }
    }
}

fn detect_runtime(cgroup_content: &str) -> String {
    let lowered = cgroup_content.to_ascii_lowercase();
    if lowered.contains("docker") {
        "docker".to_string()
    } else if lowered.contains("containerd") {
        "containerd".to_string()
    } else if lowered.contains("podman") {
        "podman".to_string()
    } else if lowered.contains("crio") {
        "crio".to_string()
    } else if lowered.contains("kubepods") {
        "kubepods".to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_docker_runtime() {
        assert_eq!(detect_runtime("12:pids:/docker/abc123\n"), "docker");
    }

    #[test]
    fn falls_back_to_kubepods() {
        assert_eq!(detect_runtime("12:pids:/kubepods/burstable/pod-xyz\n"), "kubepods");
    }

    #[test]
    fn unknown_runtime_when_no_marker_matches() {
        assert_eq!(detect_runtime("0::/init.scope\n"), "unknown");
    }
}
