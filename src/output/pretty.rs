//! Human-readable colored text formatter.
//!
//! Produces a terminal-friendly report with ANSI color codes: per-scanner
//! finding counts, individual findings grouped by scanner, warnings/errors,
//! and a one-line severity summary.

use colored::Colorize;

use super::ReportDocument;
use crate::severity::Severity;

fn severity_str(sev: Severity) -> String {
    match sev {
        Severity::Critical => "CRIT".red().bold().to_string(),
        Severity::High => "HIGH".red().to_string(),
        Severity::Medium => " MED".yellow().bold().to_string(),
        Severity::Low => " LOW".blue().to_string(),
        Severity::Info => "INFO".dimmed().to_string(),
    }
}

/// Formats a [`ReportDocument`] as human-readable, ANSI-colored text.
///
/// Sections rendered in order: scanner summary, findings by scanner,
/// warnings, errors, and a one-line severity summary.
pub fn format(document: &ReportDocument) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n\n", "  hostaudit report  ".bold().on_blue().white()));

    out.push_str(&format!("{}\n", "Scanners".bold().underline()));
    for result in &document.results {
        let has_operational_error = result.findings.iter().any(|f| f.operational_error);
        let icon = if has_operational_error {
            "FAIL".red().bold().to_string()
        } else if result.findings.is_empty() {
            "NONE".dimmed().to_string()
        } else {
            "DONE".green().bold().to_string()
        };
        out.push_str(&format!(
            "  [{icon}] {name:<20} {count} finding(s), {ms}ms\n",
            name = result.scanner,
            count = result.findings.len(),
            ms = result.duration_ms(),
        ));
    }
    out.push('\n');

    let mut any_findings = false;
    for result in &document.results {
        if result.findings.is_empty() {
            continue;
        }
        any_findings = true;
        out.push_str(&format!("{}\n", result.scanner.bold().underline()));
        for finding in &result.findings {
            out.push_str(&format!(
                "  [{sev}] {id:<30} {title}\n",
                sev = severity_str(finding.severity),
                id = finding.id.dimmed(),
                title = finding.title,
            ));
            if !finding.description.is_empty() {
                out.push_str(&format!("         {}\n", finding.description.dimmed()));
            }
        }
        out.push('\n');
    }
    if !any_findings {
        out.push_str(&format!("{}\n\n", "No findings.".dimmed()));
    }

    if !document.warnings.is_empty() {
        out.push_str(&format!("{} ({})\n", "Warnings".bold().underline(), document.warnings.len()));
        for warning in &document.warnings {
            out.push_str(&format!("  [{}] {:<20} {}\n", "WARN".yellow().bold(), warning.scanner.dimmed(), warning.detail));
        }
        out.push('\n');
    }

    if !document.errors.is_empty() {
        out.push_str(&format!("{} ({})\n", "Errors".bold().underline(), document.errors.len()));
        for error in &document.errors {
            out.push_str(&format!("  [{}] {:<20} {}\n", "ERR ".red().bold(), error.scanner.dimmed(), error.detail));
        }
        out.push('\n');
    }

    if let Some(timings) = &document.timings {
        out.push_str(&format!("{}\n", "Timings".bold().underline()));
        for t in timings {
            out.push_str(&format!("  {:<20} {}ms\n", t.scanner, t.duration_ms));
        }
        out.push('\n');
    }

    let s = &document.summary;
    out.push_str(&format!(
        "Result: {total} finding(s)  |  {crit} critical, {high} high, {med} medium, {low} low, {info} info\n",
        total = s.total,
        crit = s.critical.to_string().red().bold(),
        high = s.high.to_string().red(),
        med = s.medium.to_string().yellow(),
        low = s.low.to_string().blue(),
        info = s.info,
    ));

    out
}
