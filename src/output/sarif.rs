//! SARIF 2.1.0 output formatter (spec §6.5), for CI/CD tool integration.

use std::collections::HashMap;

use serde_sarif::sarif::{
    Message, MultiformatMessageString, ReportingDescriptor, Result as SarifResult, ResultLevel,
    Run, Sarif, Tool, ToolComponent,
};

use super::ReportDocument;
use crate::severity::Severity;

fn sarif_level(sev: Severity) -> ResultLevel {
    match sev {
        Severity::Critical | Severity::High => ResultLevel::Error,
        Severity::Medium => ResultLevel::Warning,
        Severity::Low | Severity::Info => ResultLevel::Note,
    }
}

/// Formats a [`ReportDocument`] as SARIF 2.1.0.
///
/// Every finding across every scanner becomes one SARIF result; rule ids
/// are namespaced `<scanner>.<finding id>` so identically-named findings
/// from two scanners (spec §9: duplicates across scanners are preserved)
/// don't collide in the rule catalog.
pub fn format(document: &ReportDocument) -> String {
    let mut rule_titles: HashMap<String, &str> = HashMap::new();
    for result in &document.results {
        for finding in &result.findings {
            let rule_id = format!("{}.{}", result.scanner, finding.id);
            rule_titles.entry(rule_id).or_insert(finding.title.as_str());
        }
    }

    let mut rule_ids: Vec<&String> = rule_titles.keys().collect();
    rule_ids.sort();

    let rule_index: HashMap<&String, i64> = rule_ids.iter().enumerate().map(|(i, id)| (*id, i as i64)).collect();

    let rules: Vec<ReportingDescriptor> = rule_ids
        .iter()
        .map(|id| {
            let mut rule = ReportingDescriptor::builder().id((*id).clone()).build();
            rule.short_description = Some(MultiformatMessageString::builder().text(rule_titles[*id].to_string()).build());
            rule
        })
        .collect();

    let mut results: Vec<SarifResult> = Vec::new();
    for scan_result in &document.results {
        for finding in &scan_result.findings {
            let rule_id = format!("{}.{}", scan_result.scanner, finding.id);
            let mut result = SarifResult::builder().message(Message::builder().text(finding.description.clone()).build()).build();
            result.rule_id = Some(rule_id.clone());
            result.level = Some(sarif_level(finding.severity));
            result.rule_index = rule_index.get(&rule_id).copied();
            results.push(result);
        }
    }

    let driver = ToolComponent::builder().name("hostaudit").version(env!("CARGO_PKG_VERSION").to_string()).rules(rules).build();
    let tool = Tool::builder().driver(driver).build();
    let run = Run::builder().tool(tool).results(results).build();
    let sarif = Sarif::builder().version("2.1.0").runs(vec![run]).build();

    serde_json::to_string_pretty(&sarif).expect("SARIF serialization failed")
}
