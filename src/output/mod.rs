//! Report serialization (spec §6.5).
//!
//! Formatters read a [`ReportDocument`] — a snapshot built from a finished
//! [`Report`] plus [`Config`] — and produce a `String`. They hold no engine
//! state of their own and never mutate the report.
//!
//! | Format | Module | Use case |
//! |--------|--------|----------|
//! | [`Pretty`](OutputFormat::Pretty)   | [`pretty`] | Terminal / human review |
//! | [`Json`](OutputFormat::Json)       | [`json`]   | Automation / scripting  |
//! | [`Ndjson`](OutputFormat::Ndjson)   | [`ndjson`] | Streaming ingestion     |
//! | [`Sarif`](OutputFormat::Sarif)     | [`sarif`]  | CI/CD integration       |

pub mod json;
pub mod ndjson;
pub mod pretty;
pub mod sarif;

use crate::config::Config;
use crate::finding::{now_ms, ScanError, ScanResult, ScannerTiming, Warning};
use crate::report::Report;
use crate::severity::Severity;

/// Output formats the CLI can select between (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum OutputFormat {
    Pretty,
    Json,
    Ndjson,
    Sarif,
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Summary {
    pub info: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub total: usize,
}

/// Everything a formatter needs, assembled once from a finished [`Report`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportDocument {
    pub generated_at_ms: u64,
    pub results: Vec<ScanResult>,
    pub warnings: Vec<Warning>,
    pub errors: Vec<ScanError>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<Vec<ScannerTiming>>,
}

/// Assembles a [`ReportDocument`] from a finished run.
///
/// `scanner_order` is the registry's registration order (spec §4.G); results
/// are sorted into that order regardless of the (unspecified) completion
/// order under parallel dispatch. When `config.canonical` is set, scanners
/// are instead sorted alphabetically by name for reproducible diffs across
/// runs with a different registration order.
pub fn build_document(scanner_order: &[&str], report: &Report, config: &Config) -> ReportDocument {
    let min_severity = Severity::from_str_lenient(&config.min_severity);
    let mut results = report.results_snapshot();
    for result in &mut results {
        result.findings.retain(|f| f.severity >= min_severity);
    }

    if config.canonical {
        results.sort_by(|a, b| a.scanner.cmp(&b.scanner));
    } else {
        results.sort_by_key(|r| scanner_order.iter().position(|n| *n == r.scanner).unwrap_or(usize::MAX));
    }

    let mut warnings = report.warnings_snapshot();
    let mut errors = report.errors_snapshot();
    if config.canonical {
        warnings.sort_by(|a, b| a.scanner.cmp(&b.scanner).then(a.detail.cmp(&b.detail)));
        errors.sort_by(|a, b| a.scanner.cmp(&b.scanner).then(a.detail.cmp(&b.detail)));
    }

    let mut summary = Summary::default();
    for result in &results {
        for finding in &result.findings {
            match finding.severity {
                Severity::Info => summary.info += 1,
                Severity::Low => summary.low += 1,
                Severity::Medium => summary.medium += 1,
                Severity::High => summary.high += 1,
                Severity::Critical => summary.critical += 1,
            }
        }
    }
    summary.total = summary.info + summary.low + summary.medium + summary.high + summary.critical;

    let timings = config.timings.then(|| report.scanner_timings());

    ReportDocument { generated_at_ms: now_ms(), results, warnings, errors, summary, timings }
}

/// Formats `report` using `format`, honoring `config.compact`/`canonical`.
pub fn format_report(scanner_order: &[&str], report: &Report, config: &Config, format: OutputFormat) -> String {
    let document = build_document(scanner_order, report, config);
    match format {
        OutputFormat::Pretty => pretty::format(&document),
        OutputFormat::Json => json::format(&document, config.compact),
        OutputFormat::Ndjson => ndjson::format(&document),
        OutputFormat::Sarif => sarif::format(&document),
    }
}
