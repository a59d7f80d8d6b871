//! Newline-delimited JSON output formatter (spec §6.5).
//!
//! One JSON object per line, tagged by `record_type`, so a consumer can
//! stream the report without buffering the whole document: one line per
//! finding, one per warning, one per error, and a trailing summary line.

use super::ReportDocument;

#[derive(serde::Serialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
enum Record<'a> {
    Finding {
        scanner: &'a str,
        #[serde(flatten)]
        finding: &'a crate::finding::Finding,
    },
    Warning {
        #[serde(flatten)]
        warning: &'a crate::finding::Warning,
    },
    Error {
        #[serde(flatten)]
        error: &'a crate::finding::ScanError,
    },
    Summary {
        generated_at_ms: u64,
        #[serde(flatten)]
        summary: &'a super::Summary,
    },
}

/// Formats a [`ReportDocument`] as NDJSON.
pub fn format(document: &ReportDocument) -> String {
    let mut out = String::new();

    for result in &document.results {
        for finding in &result.findings {
            let record = Record::Finding { scanner: &result.scanner, finding };
            out.push_str(&serde_json::to_string(&record).expect("NDJSON serialization failed"));
            out.push('\n');
        }
    }

    for warning in &document.warnings {
        let record = Record::Warning { warning };
        out.push_str(&serde_json::to_string(&record).expect("NDJSON serialization failed"));
        out.push('\n');
    }

    for error in &document.errors {
        let record = Record::Error { error };
        out.push_str(&serde_json::to_string(&record).expect("NDJSON serialization failed"));
        out.push('\n');
    }

    let record = Record::Summary { generated_at_ms: document.generated_at_ms, summary: &document.summary };
    out.push_str(&serde_json::to_string(&record).expect("NDJSON serialization failed"));
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::finding::Finding;
    use crate::report::Report;
    use crate::severity::Severity;

    #[test]
    fn one_line_per_finding_plus_trailing_summary() {
        let report = Report::new();
        report.add_finding("network", Finding::new("a", "t", Severity::Low, "d"));
        report.add_finding("network", Finding::new("b", "t", Severity::High, "d"));
        let config = Config::default();
        let document = super::super::build_document(&["network"], &report, &config);

        let text = format(&document);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"record_type\":\"finding\""));
        assert!(lines[2].contains("\"record_type\":\"summary\""));
    }
}
