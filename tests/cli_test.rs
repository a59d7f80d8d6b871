use assert_cmd::Command;
use predicates::prelude::*;

fn hostaudit() -> Command {
    Command::cargo_bin("hostaudit").unwrap()
}

#[test]
fn default_run_succeeds_and_prints_a_report() {
    hostaudit().args(["--enable", "process"]).assert().success().stdout(predicate::str::contains("hostaudit report"));
}

#[test]
fn json_format_contains_tool_name() {
    hostaudit()
        .args(["--enable", "process", "--format", "json", "--compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tool\":\"hostaudit\""));
}

#[test]
fn ndjson_format_emits_a_trailing_summary_line() {
    hostaudit()
        .args(["--enable", "process", "--format", "ndjson"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"record_type\":\"summary\""));
}

#[test]
fn fail_on_count_zero_forces_nonzero_exit() {
    hostaudit().args(["--enable", "process", "--fail-on-count", "0"]).assert().code(1);
}

#[test]
fn enabling_an_unknown_scanner_name_yields_no_findings() {
    hostaudit()
        .args(["--enable", "not-a-real-scanner", "--format", "json", "--compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\":0"));
}

#[test]
fn missing_rules_dir_is_a_warning_not_a_failure() {
    hostaudit()
        .args([
            "--enable",
            "process",
            "--rules-enable",
            "--rules-dir",
            "/nonexistent/hostaudit-rules-dir",
            "--format",
            "json",
            "--compact",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("rules_dir_missing"));
}
