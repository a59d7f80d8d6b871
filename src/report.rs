//! Thread-safe report aggregation (spec §3 "Report", §4.A).
//!
//! The [`Report`] is the single shared mutable object across scanners. Adds
//! from different scanners proceed independently; a per-scanner lock
//! (rather than one global mutex) keeps sequential-scanner contention at
//! zero while still serializing concurrent appends within a scanner.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::finding::{now_ms, DiagnosticCode, Finding, ScanError, ScanResult, ScannerTiming, Warning};
use crate::severity::Severity;

/// Aggregate of [`ScanResult`]s, [`Warning`]s, and [`ScanError`]s for one run.
///
/// Invariant (spec §3): findings once appended are never removed. The rule
/// engine may mutate fields in place but must not reorder or delete.
pub struct Report {
    // Keyed by scanner name, one slot per registered scanner so that
    // serialization can walk scanners in registration order regardless of
    // the (unspecified) completion order under parallel dispatch.
    results: Mutex<Vec<ScanResult>>,
    warnings: Mutex<Vec<Warning>>,
    errors: Mutex<Vec<ScanError>>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Report {
            results: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Appends a finding. Creates the scanner's [`ScanResult`] slot on first
    /// use with `start_time = now`; `end_time` is bumped on every add as a
    /// crude last-write-wins duration (spec §4.A) — the registry may also set
    /// it explicitly once the scanner call returns.
    pub fn add_finding(&self, scanner: &str, finding: Finding) {
        let mut results = self.results.lock().unwrap();
        let slot = match results.iter_mut().find(|r| r.scanner == scanner) {
            Some(r) => r,
            None => {
                results.push(ScanResult::new(scanner));
                results.last_mut().unwrap()
            }
        };
        slot.findings.push(finding);
        slot.end_time_ms = now_ms();
    }

    /// Ensures a (possibly empty) [`ScanResult`] slot exists for `scanner`,
    /// so scanners that emit zero findings still appear in the report.
    pub fn ensure_scanner(&self, scanner: &str) {
        let mut results = self.results.lock().unwrap();
        if !results.iter().any(|r| r.scanner == scanner) {
            results.push(ScanResult::new(scanner));
        }
    }

    /// Explicitly sets a scanner's end time — called by the registry once a
    /// scanner's `scan()` call returns, so duration reflects wall clock even
    /// for scanners that stopped emitting findings before finishing work.
    pub fn finalize_scanner_timing(&self, scanner: &str, end_time_ms: u64) {
        let mut results = self.results.lock().unwrap();
        if let Some(r) = results.iter_mut().find(|r| r.scanner == scanner) {
            r.end_time_ms = r.end_time_ms.max(end_time_ms);
        }
    }

    pub fn add_warning(&self, scanner: &str, code: DiagnosticCode, detail: impl Into<String>) {
        self.warnings.lock().unwrap().push(Warning {
            scanner: scanner.to_string(),
            code,
            detail: detail.into(),
        });
    }

    pub fn add_error(&self, scanner: &str, code: DiagnosticCode, detail: impl Into<String>) {
        self.errors.lock().unwrap().push(ScanError {
            scanner: scanner.to_string(),
            code,
            detail: detail.into(),
        });
    }

    pub fn total_findings(&self) -> usize {
        self.results
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.findings.len())
            .sum()
    }

    pub fn count_by_severity(&self, sev: Severity) -> usize {
        self.results
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.findings.iter())
            .filter(|f| f.severity == sev)
            .count()
    }

    pub fn findings_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for sev in Severity::ALL {
            counts.insert(sev, self.count_by_severity(sev));
        }
        counts
    }

    /// Returns a snapshot of all results in the order scanners first
    /// appended to the report. The registry re-sorts this into registration
    /// order before handing it to a serializer.
    pub fn results_snapshot(&self) -> Vec<ScanResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn warnings_snapshot(&self) -> Vec<Warning> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn errors_snapshot(&self) -> Vec<ScanError> {
        self.errors.lock().unwrap().clone()
    }

    /// Per-scanner wall-clock summary, surfaced only when `config.timings`.
    pub fn scanner_timings(&self) -> Vec<ScannerTiming> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .map(|r| ScannerTiming {
                scanner: r.scanner.clone(),
                duration_ms: r.duration_ms(),
            })
            .collect()
    }

    /// Applies a mutating closure to every finding matching `scanner` (or
    /// all findings when `scanner` is `None`). Used by the rule engine —
    /// never reorders or removes entries (spec §3 invariant).
    pub fn mutate_findings<F: FnMut(&mut Finding)>(&self, scanner: Option<&str>, mut f: F) {
        let mut results = self.results.lock().unwrap();
        for result in results.iter_mut() {
            if let Some(name) = scanner {
                if result.scanner != name {
                    continue;
                }
            }
            for finding in result.findings.iter_mut() {
                f(finding);
            }
        }
    }
}

impl Clone for ScanResult {
    fn clone(&self) -> Self {
        ScanResult {
            scanner: self.scanner.clone(),
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
            findings: self.findings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    #[test]
    fn add_finding_creates_scan_result_once() {
        let r = Report::new();
        r.add_finding("net", Finding::new("a", "t", Severity::Low, "d"));
        r.add_finding("net", Finding::new("b", "t", Severity::Low, "d"));
        let snap = r.results_snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].findings.len(), 2);
        // Emission order preserved within a scanner.
        assert_eq!(snap[0].findings[0].id, "a");
        assert_eq!(snap[0].findings[1].id, "b");
    }

    #[test]
    fn total_findings_counts_across_scanners() {
        let r = Report::new();
        r.add_finding("a", Finding::new("1", "t", Severity::Info, "d"));
        r.add_finding("b", Finding::new("2", "t", Severity::High, "d"));
        assert_eq!(r.total_findings(), 2);
        assert_eq!(r.count_by_severity(Severity::High), 1);
    }

    #[test]
    fn mutate_findings_does_not_reorder() {
        let r = Report::new();
        r.add_finding("net", Finding::new("a", "t", Severity::Low, "d"));
        r.add_finding("net", Finding::new("b", "t", Severity::Low, "d"));
        r.mutate_findings(Some("net"), |f| {
            if f.id == "b" {
                f.severity = Severity::Critical;
            }
        });
        let snap = r.results_snapshot();
        assert_eq!(snap[0].findings[0].id, "a");
        assert_eq!(snap[0].findings[1].id, "b");
        assert_eq!(snap[0].findings[1].severity, Severity::Critical);
    }
}
