//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;

/// Build command for the breadboard-cli binary (finds it in target/debug when run via cargo test).
fn breadboard_cli() -> Command {
    cargo_bin_cmd!("breadboard-cli")
}

/// Path to breadboard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("breadboard")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = breadboard_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("circuit simulator"));
}

#[test]
fn test_cli_version() {
    let mut cmd = breadboard_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_run_clean_circuit() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("night_light.json");

    cmd.arg("run")
        .arg(path)
        .arg("--ticks")
        .arg("50")
        .arg("--fail-on")
        .arg("info");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Simulated 50 ms"))
        .stdout(predicate::str::contains("No warnings raised"));
}

#[test]
fn test_cli_run_short_fails_on_error() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("short_circuit.json");

    cmd.arg("run")
        .arg(path)
        .arg("--ticks")
        .arg("10")
        .arg("--fail-on")
        .arg("error");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("SHORT_CIRCUIT"))
        .stdout(predicate::str::contains("ERROR"));
}

#[test]
fn test_cli_run_short_without_threshold_succeeds() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("short_circuit.json");

    cmd.arg("run").arg(path).arg("--ticks").arg("10");

    cmd.assert().success();
}

#[test]
fn test_cli_run_json_output() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("led_no_resistor.json");

    cmd.arg("run")
        .arg(path)
        .arg("--ticks")
        .arg("20")
        .arg("--format")
        .arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let report: Value = serde_json::from_slice(&output).expect("stdout should be JSON");
    assert_eq!(report["snapshot"]["state"]["simTimeMs"], 20);
    assert_eq!(report["findings"][0]["warning"]["code"], "LED_NO_RESISTOR");
    assert_eq!(report["findings"][0]["ticks"], 20);
    assert!(report["summary"]["errors"].as_u64().unwrap() >= 1);
}

#[test]
fn test_cli_run_seed_override_is_reported() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("night_light.json");

    cmd.arg("run")
        .arg(path)
        .arg("--ticks")
        .arg("5")
        .arg("--seed")
        .arg("1234")
        .arg("--format")
        .arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let report: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["snapshot"]["state"]["seed"], 1234);
}

#[test]
fn test_cli_run_github_format() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("short_circuit.json");

    cmd.arg("run")
        .arg(path)
        .arg("--ticks")
        .arg("3")
        .arg("--format")
        .arg("github");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("::error"))
        .stdout(predicate::str::contains("title=SHORT_CIRCUIT"));
}

#[test]
fn test_cli_run_broken_document_needs_lenient() {
    let path = fixtures_dir().join("broken_reference.json");

    breadboard_cli()
        .arg("run")
        .arg(&path)
        .arg("--ticks")
        .arg("2")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));

    breadboard_cli()
        .arg("run")
        .arg(&path)
        .arg("--ticks")
        .arg("2")
        .arg("--lenient")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped:"));
}

#[test]
fn test_cli_run_future_version_errors() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("from_the_future.json");

    cmd.arg("run").arg(path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("newer than the supported version"));
}

#[test]
fn test_cli_run_nonexistent_file() {
    let mut cmd = breadboard_cli();

    cmd.arg("run").arg("nonexistent.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_cli_validate_reports_broken_references() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("broken_reference.json");

    cmd.arg("validate").arg(path);

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("ghost"))
        .stdout(predicate::str::contains("capacitor"));
}

#[test]
fn test_cli_validate_legacy_document() {
    let mut cmd = breadboard_cli();
    let path = fixtures_dir().join("legacy_v1.json");

    cmd.arg("validate").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("migrated to 3"))
        .stdout(predicate::str::contains("Document is valid"));
}

#[test]
fn test_cli_migrate_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("doorbell.json");
    let mut cmd = breadboard_cli();

    cmd.arg("migrate")
        .arg(fixtures_dir().join("legacy_v1.json"))
        .arg("--output")
        .arg(&out);

    cmd.assert().success();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("\"schemaVersion\": 3"));
    let document: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document["components"][1]["kind"], "push_button");
}

#[test]
fn test_cli_kinds() {
    let mut cmd = breadboard_cli();

    cmd.arg("kinds").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("push_button"))
        .stdout(predicate::str::contains("Pins:"));
}

#[test]
fn test_cli_codes() {
    let mut cmd = breadboard_cli();

    cmd.arg("codes");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("FLOATING_INPUT"))
        .stdout(predicate::str::contains("warning"));
}
