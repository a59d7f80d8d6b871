//! Core report value types.
//!
//! A scan produces a [`Report`] (see [`crate::report`]) made up of per-scanner
//! [`ScanResult`]s, each holding a list of [`Finding`]s, plus structured
//! [`Warning`]s and [`ScanError`]s that are tracked separately from findings
//! (spec §3: "Distinguished from findings; not counted in severity gating").

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::severity::Severity;

/// Insertion-order-preserving string metadata map.
///
/// Findings carry conventional keys (spec §6.3); callers insert in whatever
/// order makes sense for the scanner and the map preserves it for display
/// and serialization, unlike a `HashMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Metadata(Vec<(String, String)>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(Vec::new())
    }

    /// Inserts or overwrites a key, preserving first-insertion position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut m = Metadata::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// A single emitted observation (spec §3 "Finding").
///
/// `id` is stable and unique within the emitting scanner's own namespace —
/// uniqueness is not enforced across scanners (spec §9: duplicates across
/// scanners are preserved, keyed by `(scanner, id)` for any downstream
/// dedup).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub metadata: Metadata,
    pub base_severity_score: u8,
    pub operational_error: bool,
}

impl Finding {
    /// Builds a finding, deriving `base_severity_score` from `severity` at
    /// construction time so the two can never drift apart.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Finding {
            id: id.into(),
            title: title.into(),
            severity,
            description: description.into(),
            metadata: Metadata::new(),
            base_severity_score: severity.base_score(),
            operational_error: false,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Builds the single `operational_error=true` finding the registry emits
    /// when a scanner panics or returns a propagated failure (spec §7).
    pub fn operational_error(scanner: &str, detail: impl Into<String>) -> Self {
        let mut f = Finding::new(
            format!("{scanner}:operational_error"),
            "Scanner operational error",
            Severity::High,
            detail,
        );
        f.operational_error = true;
        f
    }
}

/// Closed enum of warning/error codes a scanner can emit (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    ParamUnreadable,
    ProcUnreadableStatus,
    ProcUnreadableCmdline,
    ProcExeSymlinkUnreadable,
    NetFileUnreadable,
    DecompressFail,
    WalkError,
    RulesDirMissing,
    BadRegex,
    NoConditions,
    Unknown,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::ParamUnreadable => "ParamUnreadable",
            DiagnosticCode::ProcUnreadableStatus => "ProcUnreadableStatus",
            DiagnosticCode::ProcUnreadableCmdline => "ProcUnreadableCmdline",
            DiagnosticCode::ProcExeSymlinkUnreadable => "ProcExeSymlinkUnreadable",
            DiagnosticCode::NetFileUnreadable => "NetFileUnreadable",
            DiagnosticCode::DecompressFail => "DecompressFail",
            DiagnosticCode::WalkError => "WalkError",
            DiagnosticCode::RulesDirMissing => "RulesDirMissing",
            DiagnosticCode::BadRegex => "BadRegex",
            DiagnosticCode::NoConditions => "NoConditions",
            DiagnosticCode::Unknown => "Unknown",
        }
    }
}

/// A per-scanner structured warning (spec §3 "Warning"). Non-fatal; recorded
/// separately from findings and never gates severity thresholds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub scanner: String,
    pub code: DiagnosticCode,
    pub detail: String,
}

/// A per-scanner structured error (spec §3 "Error"). Distinct from a
/// [`Finding`] with `operational_error=true`: this is a recoverable,
/// localized failure (e.g. one unreadable file), not a whole-scanner abort.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanError {
    pub scanner: String,
    pub code: DiagnosticCode,
    pub detail: String,
}

/// One scanner invocation's worth of findings plus timing (spec §3
/// "ScanResult"). `start_time`/`end_time` are populated regardless of the
/// `timings` config flag; only their surfacing in the serialized summary is
/// conditional.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanResult {
    pub scanner: String,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub findings: Vec<Finding>,
}

impl ScanResult {
    pub fn new(scanner: impl Into<String>) -> Self {
        let now = now_ms();
        ScanResult {
            scanner: scanner.into(),
            start_time_ms: now,
            end_time_ms: now,
            findings: Vec::new(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-scanner wall-clock summary surfaced when `config.timings` is set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScannerTiming {
    pub scanner: String,
    pub duration_ms: u64,
}

/// Returns the findings at or above `min_severity`.
pub fn filter_by_min_severity(findings: &[Finding], min_severity: Severity) -> Vec<&Finding> {
    findings.iter().filter(|f| f.severity >= min_severity).collect()
}

/// Groups findings by severity for `count_by_severity`-style summaries.
pub fn count_by_severity(findings: &[Finding]) -> BTreeMap<Severity, usize> {
    let mut counts = BTreeMap::new();
    for f in findings {
        *counts.entry(f.severity).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_preserves_insertion_order() {
        let mut m = Metadata::new();
        m.insert("b", "2").insert("a", "1").insert("b", "20");
        let pairs: Vec<_> = m.iter().collect();
        assert_eq!(pairs, vec![("b", "20"), ("a", "1")]);
    }

    #[test]
    fn finding_base_score_matches_severity() {
        let f = Finding::new("x", "t", Severity::High, "d");
        assert_eq!(f.base_severity_score, Severity::High.base_score());
        assert!(!f.operational_error);
    }

    #[test]
    fn operational_error_finding_is_flagged() {
        let f = Finding::operational_error("net", "panic in scan()");
        assert!(f.operational_error);
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.id, "net:operational_error");
    }
}
