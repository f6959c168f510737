//! CLI tests for the `flowcheck` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn fixture(name: &str) -> String {
    format!("{}/../../tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn flowcheck() -> Command {
    let mut cmd = Command::cargo_bin("flowcheck").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_clean_unit_passes() {
    flowcheck()
        .args(["check", "--no-color", &fixture("clean.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_errors_fail_the_run() {
    flowcheck()
        .args(["check", "--no-color", &fixture("calc.json")])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Calc.java: error[division-by-zero] in Calc.broken: division by zero (`a / d`)",
        ))
        .stdout(predicate::str::contains(
            "Calc.java: warning[constant-condition] in Calc.broken: condition is always true (`d == 0`)",
        ))
        .stdout(predicate::str::contains("Found 2 issue(s): 1 error, 1 warning, 0 info"));
}

#[test]
fn test_json_format() {
    let output = flowcheck()
        .args(["check", "--format", "json", &fixture("calc.json"), &fixture("clean.json")])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let units = value["units"].as_array().unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0]["unit"], "Calc.java");
    assert_eq!(units[0]["diagnostics"].as_array().unwrap().len(), 2);
    assert_eq!(units[1]["diagnostics"].as_array().unwrap().len(), 0);
    assert!(value["stats"]["cfg_builds"].as_u64().unwrap() >= 3);
}

#[test]
fn test_unresolved_type_skips_fragment() {
    flowcheck()
        .args(["check", "--no-color", &fixture("unresolved.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Service.java: skipped Service.run: cannot resolve symbol `Widget`",
        ));

    flowcheck()
        .args(["check", "--no-color", "--known-type", "Widget", &fixture("unresolved.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped").not())
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_config_file_disables_checker() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[checks]\ndisabled = [\"division-by-zero\"]").unwrap();

    flowcheck()
        .args(["check", "--no-color", "--config"])
        .arg(config.path())
        .arg(fixture("calc.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("constant-condition"))
        .stdout(predicate::str::contains("division-by-zero").not());
}

#[test]
fn test_config_known_types() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[checks]\nknown_types = [\"Widget\"]").unwrap();

    flowcheck()
        .args(["check", "--no-color", "--config"])
        .arg(config.path())
        .arg(fixture("unresolved.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped").not());
}

#[test]
fn test_cfg_prints_named_fragment() {
    flowcheck()
        .args(["cfg", &fixture("calc.json"), "--fragment", "Calc.safe"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Calc.safe ("))
        .stdout(predicate::str::contains("param a"))
        .stdout(predicate::str::contains("binary /"))
        .stdout(predicate::str::contains("Calc.broken").not());
}

#[test]
fn test_cfg_unknown_fragment() {
    flowcheck()
        .args(["cfg", &fixture("calc.json"), "--fragment", "Calc.nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no fragment named `Calc.nope`"));
}

#[test]
fn test_missing_file() {
    flowcheck()
        .args(["check", "does-not-exist.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read does-not-exist.json"));
}

#[test]
fn test_malformed_unit() {
    let mut unit = tempfile::NamedTempFile::new().unwrap();
    write!(unit, "{{\"name\": \"Broken.java\", \"classes\": [{{\"members\": 3}}]}}").unwrap();

    flowcheck()
        .arg("check")
        .arg(unit.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse compilation unit"));
}
