//! JSON output formatter (spec §6.5).
//!
//! Produces a structured JSON document: tool metadata, a severity summary,
//! and the full list of per-scanner results, warnings, and errors.

use super::ReportDocument;

#[derive(serde::Serialize)]
struct JsonOutput<'a> {
    tool: &'static str,
    version: &'static str,
    #[serde(flatten)]
    document: &'a ReportDocument,
}

/// Formats a [`ReportDocument`] as JSON; pretty-printed unless `compact`.
///
/// # Panics
///
/// Panics if the document cannot be serialized (should not happen — every
/// field type here derives `Serialize` without a fallible custom impl).
pub fn format(document: &ReportDocument, compact: bool) -> String {
    let output = JsonOutput { tool: "hostaudit", version: env!("CARGO_PKG_VERSION"), document };

    if compact {
        serde_json::to_string(&output).expect("JSON serialization failed")
    } else {
        serde_json::to_string_pretty(&output).expect("JSON serialization failed")
    }
}
