//! Post-scan rule engine (spec §4.X, §3 "Rule / RuleCondition").
//!
//! Rules are loaded once from a directory of TOML files, precompiling each
//! condition's regex, then applied to every finding a scanner emits. Rules
//! never remove findings; they may only set a severity override and merge
//! MITRE technique metadata.

use std::path::Path;

use regex::Regex;

use crate::finding::{DiagnosticCode, Finding};
use crate::report::Report;
use crate::severity::Severity;

const MAX_RULES: usize = 1000;
const MAX_CONDITIONS_PER_RULE: usize = 25;
const MAX_REGEX_CHARS: usize = 512;
const SUPPORTED_VERSION: u32 = 1;

/// On-disk rule definition, deserialized directly from TOML.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RuleFile {
    pub id: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub logic_any: bool,
    pub conditions: Vec<RuleConditionFile>,
    #[serde(default)]
    pub severity_override: Option<String>,
    #[serde(default)]
    pub mitre: Vec<String>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    SUPPORTED_VERSION
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RuleConditionFile {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

enum Matcher {
    Contains(String),
    Equals(String),
    Regex(Regex),
}

struct Condition {
    field: String,
    matcher: Matcher,
}

/// A loaded, precompiled rule ready for [`RuleEngine::apply`].
pub struct Rule {
    pub id: String,
    pub scope: Option<String>,
    pub logic_any: bool,
    conditions: Vec<Condition>,
    pub severity_override: Option<Severity>,
    pub mitre: Vec<String>,
}

/// Rule-engine lifecycle state (spec §4.X state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// Owns the loaded rule set for the process's lifetime: `load_dir` once,
/// then any number of `apply` calls (spec §3 "Lifecycle").
pub struct RuleEngine {
    rules: Vec<Rule>,
    state: EngineState,
}

impl Default for RuleEngine {
    fn default() -> Self {
        RuleEngine {
            rules: Vec::new(),
            state: EngineState::Empty,
        }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Loads every `*.toml` rule file in `dir`, reporting degraded rules as
    /// warnings on `report` rather than failing the whole load. `allow_legacy`
    /// mirrors `config.rules_allow_legacy` (spec §4.X version check).
    pub fn load_dir(&mut self, dir: &Path, report: &Report, allow_legacy: bool) {
        self.state = EngineState::Loading;

        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => {
                report.add_warning("rules", DiagnosticCode::RulesDirMissing, format!("{}: rules directory missing", dir.display()));
                self.state = EngineState::Error;
                return;
            }
        };

        let mut files: Vec<_> = entries.flatten().filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("toml")).collect();
        files.sort_by_key(|e| e.file_name());

        for entry in files {
            if self.rules.len() >= MAX_RULES {
                break;
            }
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let raw: RuleFile = match toml::from_str(&content) {
                Ok(r) => r,
                Err(e) => {
                    report.add_warning("rules", DiagnosticCode::BadRegex, format!("{}: parse error: {e}", entry.path().display()));
                    continue;
                }
            };

            if let Some(rule) = self.compile_rule(raw, report, allow_legacy) {
                self.rules.push(rule);
            }
        }

        self.state = EngineState::Ready;
    }

    fn compile_rule(&self, raw: RuleFile, report: &Report, allow_legacy: bool) -> Option<Rule> {
        if raw.version != SUPPORTED_VERSION && !allow_legacy {
            report.add_warning("rules", DiagnosticCode::Unknown, format!("{}: unsupported rule version {}", raw.id, raw.version));
            return None;
        }
        if raw.conditions.is_empty() {
            report.add_warning("rules", DiagnosticCode::NoConditions, format!("{}: rule has no conditions", raw.id));
            return None;
        }
        if raw.conditions.len() > MAX_CONDITIONS_PER_RULE {
            report.add_warning("rules", DiagnosticCode::Unknown, format!("{}: exceeds {} conditions", raw.id, MAX_CONDITIONS_PER_RULE));
            return None;
        }

        let mut conditions = Vec::with_capacity(raw.conditions.len());
        for cond in raw.conditions {
            let field = if cond.field.is_empty() { "description".to_string() } else { cond.field };

            let matcher = if let Some(pattern) = cond.regex {
                if pattern.len() > MAX_REGEX_CHARS {
                    report.add_warning("rules", DiagnosticCode::BadRegex, format!("{}: regex exceeds {} chars", raw.id, MAX_REGEX_CHARS));
                    return None;
                }
                match Regex::new(&pattern) {
                    Ok(re) => Matcher::Regex(re),
                    Err(e) => {
                        report.add_warning("rules", DiagnosticCode::BadRegex, format!("{}: bad regex: {e}", raw.id));
                        return None;
                    }
                }
            } else if let Some(value) = cond.equals {
                Matcher::Equals(value)
            } else if let Some(value) = cond.contains {
                Matcher::Contains(value)
            } else {
                report.add_warning("rules", DiagnosticCode::Unknown, format!("{}: condition has no matcher", raw.id));
                return None;
            };

            conditions.push(Condition { field, matcher });
        }

        Some(Rule {
            id: raw.id,
            scope: raw.scope,
            logic_any: raw.logic_any,
            conditions,
            severity_override: raw.severity_override.map(|s| Severity::from_str_lenient(&s)),
            mitre: raw.mitre,
        })
    }

    /// Applies every loaded rule in scope for `scanner` to `finding`,
    /// mutating severity and metadata in place. Idempotent: re-applying the
    /// same rule set to an already-mutated finding yields the same state
    /// (spec §8 property 13).
    pub fn apply(&self, scanner: &str, finding: &mut Finding) {
        if self.state != EngineState::Ready {
            return;
        }
        for rule in &self.rules {
            let in_scope = matches!(&rule.scope, None) || rule.scope.as_deref() == Some("*") || rule.scope.as_deref() == Some(scanner);
            if !in_scope {
                continue;
            }

            let results = rule.conditions.iter().map(|c| evaluate_condition(c, finding));
            let matched = if rule.logic_any { results.fold(false, |acc, r| acc || r) } else { results.fold(true, |acc, r| acc && r) };

            if matched {
                if let Some(sev) = rule.severity_override {
                    finding.severity = sev;
                    finding.base_severity_score = sev.base_score();
                }
                if !rule.mitre.is_empty() {
                    let existing = finding.metadata.get("mitre_techniques").unwrap_or("").to_string();
                    let mut techniques: Vec<String> = existing.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
                    for t in &rule.mitre {
                        if !techniques.contains(t) {
                            techniques.push(t.clone());
                        }
                    }
                    finding.metadata.insert("mitre_techniques", techniques.join(","));
                }
            }
        }
    }
}

fn evaluate_condition(cond: &Condition, finding: &Finding) -> bool {
    let value = field_value(cond, finding);
    match &cond.matcher {
        Matcher::Contains(s) => value.contains(s.as_str()),
        Matcher::Equals(s) => value == *s,
        Matcher::Regex(re) => re.is_match(&value),
    }
}

fn field_value(cond: &Condition, finding: &Finding) -> String {
    match cond.field.as_str() {
        "id" => finding.id.clone(),
        "title" => finding.title.clone(),
        "description" => finding.description.clone(),
        key => finding.metadata.get(key.strip_prefix("metadata.").unwrap_or(key)).unwrap_or("").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn sample_finding() -> Finding {
        Finding::new("tcp:23:1", "telnet listener", Severity::Medium, "telnet").meta("state", "LISTEN").meta("lport", "23")
    }

    #[test]
    fn all_logic_requires_every_condition() {
        let rule = Rule {
            id: "telnet-critical".to_string(),
            scope: Some("network".to_string()),
            logic_any: false,
            conditions: vec![
                Condition { field: "state".to_string(), matcher: Matcher::Equals("LISTEN".to_string()) },
                Condition { field: "lport".to_string(), matcher: Matcher::Equals("23".to_string()) },
            ],
            severity_override: Some(Severity::Critical),
            mitre: vec!["T1021.004".to_string()],
        };
        let engine = RuleEngine {
            rules: vec![rule],
            state: EngineState::Ready,
        };

        let mut finding = sample_finding();
        engine.apply("network", &mut finding);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.metadata.get("mitre_techniques"), Some("T1021.004"));
    }

    #[test]
    fn apply_is_idempotent() {
        let rule = Rule {
            id: "telnet-critical".to_string(),
            scope: None,
            logic_any: false,
            conditions: vec![Condition { field: "state".to_string(), matcher: Matcher::Equals("LISTEN".to_string()) }],
            severity_override: Some(Severity::Critical),
            mitre: vec!["T1021.004".to_string()],
        };
        let engine = RuleEngine {
            rules: vec![rule],
            state: EngineState::Ready,
        };

        let mut finding = sample_finding();
        engine.apply("network", &mut finding);
        let after_first = finding.clone();
        engine.apply("network", &mut finding);
        assert_eq!(finding.severity, after_first.severity);
        assert_eq!(finding.metadata.get("mitre_techniques"), after_first.metadata.get("mitre_techniques"));
    }

    #[test]
    fn out_of_scope_rule_does_not_apply() {
        let rule = Rule {
            id: "scoped".to_string(),
            scope: Some("suid".to_string()),
            logic_any: false,
            conditions: vec![Condition { field: "state".to_string(), matcher: Matcher::Equals("LISTEN".to_string()) }],
            severity_override: Some(Severity::Critical),
            mitre: vec![],
        };
        let engine = RuleEngine {
            rules: vec![rule],
            state: EngineState::Ready,
        };
        let mut finding = sample_finding();
        engine.apply("network", &mut finding);
        assert_eq!(finding.severity, Severity::Medium);
    }

    #[test]
    fn not_ready_engine_is_a_no_op() {
        let engine = RuleEngine::new();
        let mut finding = sample_finding();
        let before = finding.severity;
        engine.apply("network", &mut finding);
        assert_eq!(finding.severity, before);
    }
}
