//! Systemd unit hardening scanner (spec §4.P "Systemd").
//!
//! Parses `.service` unit files from the three standard directories
//! (first-seen-wins across the precedence list) and evaluates each unit's
//! `[Service]` section against a fixed hardening directive table.

use std::collections::HashMap;
use std::fs;

use crate::context::ScanContext;
use crate::finding::Finding;
use crate::registry::Scanner;
use crate::severity::Severity;

const NAME: &str = "systemd";

const UNIT_DIRS: &[&str] = &["/etc/systemd/system", "/usr/lib/systemd/system", "/lib/systemd/system"];

struct Directive {
    key: &'static str,
    /// Expected value for an equality check; `None` means the directive is
    /// compliant as soon as it's present, regardless of value (spec §4.R:
    /// "`CapabilityBoundingSet` present" has no fixed expected value).
    expected: Option<&'static str>,
    severity: Severity,
}

const DIRECTIVES: &[Directive] = &[
    Directive { key: "NoNewPrivileges", expected: Some("yes"), severity: Severity::Medium },
    Directive { key: "PrivateTmp", expected: Some("yes"), severity: Severity::Low },
    Directive { key: "ProtectSystem", expected: Some("strict"), severity: Severity::Medium },
    Directive { key: "ProtectHome", expected: Some("read-only"), severity: Severity::Medium },
    Directive { key: "CapabilityBoundingSet", expected: None, severity: Severity::Medium },
    Directive { key: "RestrictNamespaces", expected: Some("yes"), severity: Severity::Low },
    Directive { key: "RestrictSUIDSGID", expected: Some("yes"), severity: Severity::Medium },
    Directive { key: "ProtectKernelModules", expected: Some("yes"), severity: Severity::Medium },
    Directive { key: "ProtectKernelTunables", expected: Some("yes"), severity: Severity::Low },
    Directive { key: "ProtectControlGroups", expected: Some("yes"), severity: Severity::Low },
    Directive { key: "MemoryDenyWriteExecute", expected: Some("yes"), severity: Severity::Medium },
    Directive { key: "RestrictRealtime", expected: Some("yes"), severity: Severity::Low },
    Directive { key: "LockPersonality", expected: Some("yes"), severity: Severity::Low },
];

pub struct SystemdUnitScanner;

impl Scanner for SystemdUnitScanner {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Evaluates systemd service unit hardening directives"
    }

    fn scan(&self, ctx: &ScanContext<'_>) {
        let mut seen_units: HashMap<String, ()> = HashMap::new();

        for dir in UNIT_DIRS {
            let entries = match fs::read_dir(dir) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("service") {
                    continue;
                }
                let unit_name = entry.file_name().to_string_lossy().to_string();
                if seen_units.contains_key(&unit_name) {
                    continue;
                }
                seen_units.insert(unit_name.clone(), ());

                let content = match fs::read_to_string(&path) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                if !content.contains("ExecStart") {
                    continue;
                }

                let directives = parse_service_directives(&content);
                for directive in DIRECTIVES {
                    let value = directives.get(directive.key).map(String::as_str);
                    let compliant = match directive.expected {
                        Some(expected) => value == Some(expected),
                        None => value.is_some(),
                    };
                    let severity = if compliant { Severity::Info } else { directive.severity };

                    ctx.report.add_finding(
                        NAME,
                        Finding::new(
                            format!("{unit_name}:{}", directive.key),
                            format!("{unit_name} {}", directive.key),
                            severity,
                            format!("{}={}", directive.key, value.unwrap_or("(unset)")),
                        )
                        .meta("unit", unit_name.clone())
                        .meta("key", directive.key)
                        .meta("value", value.unwrap_or("(unset)")),
                    );
                }
            }
        }
    }
}

fn parse_service_directives(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut in_service_section = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_service_section = trimmed.eq_ignore_ascii_case("[service]");
            continue;
        }
        if !in_service_section {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_section_directives() {
        let unit = "[Unit]\nDescription=x\n\n[Service]\nExecStart=/usr/bin/foo\nNoNewPrivileges=yes\nProtectSystem=strict\n";
        let directives = parse_service_directives(unit);
        assert_eq!(directives.get("NoNewPrivileges").map(String::as_str), Some("yes"));
        assert_eq!(directives.get("ProtectSystem").map(String::as_str), Some("strict"));
        assert!(!directives.contains_key("Description"));
    }

    #[test]
    fn directive_table_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for d in DIRECTIVES {
            assert!(seen.insert(d.key));
        }
    }

    #[test]
    fn capability_bounding_set_is_a_presence_only_check() {
        let directive = DIRECTIVES.iter().find(|d| d.key == "CapabilityBoundingSet").unwrap();
        assert_eq!(directive.expected, None);

        let unit = "[Service]\nExecStart=/usr/bin/foo\nCapabilityBoundingSet=CAP_NET_BIND_SERVICE\n";
        let directives = parse_service_directives(unit);
        let value = directives.get(directive.key).map(String::as_str);
        let compliant = match directive.expected {
            Some(expected) => value == Some(expected),
            None => value.is_some(),
        };
        assert!(compliant);
    }
}
