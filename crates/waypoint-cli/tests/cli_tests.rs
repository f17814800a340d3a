//! Integration tests for the `wp` binary.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper function to create a temporary directory for CLI tests
fn create_cli_test_environment() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Helper function to create a Command for the wp binary
fn wp_cmd() -> Command {
    Command::cargo_bin("wp").expect("Failed to find wp binary")
}

/// Writes a file into the test directory and returns its path
fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

const PLAN_TEXT: &str = "\
; planner chatter
0.00000: (drive truck1 depot city) [4.50000]
5.00000: (report)
; Cost: 4.5
";

#[test]
fn test_cli_parse_plain_text_plan() {
    let dir = create_cli_test_environment();
    let plan = write_file(&dir, "out.plan", PLAN_TEXT);

    wp_cmd()
        .args(["parse", plan.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0.00000: (drive truck1 depot city) [4.50000]",
        ))
        .stdout(predicate::str::contains("; Cost: 4.5"))
        .stdout(predicate::str::contains("; Makespan: 5.00000"));
}

#[test]
fn test_cli_parse_json_output() {
    let dir = create_cli_test_environment();
    let plan = write_file(&dir, "out.plan", PLAN_TEXT);

    wp_cmd()
        .args(["parse", "--json", plan.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"makespan\": 5.0"))
        .stdout(predicate::str::contains("drive truck1 depot city"));
}

#[test]
fn test_cli_parse_json_payload() {
    let dir = create_cli_test_environment();
    let plan = write_file(
        &dir,
        "service.json",
        r#"[{"time": 0.0, "duration": 2.0, "name": "(drive a b)"}]"#,
    );

    wp_cmd()
        .args(["parse", plan.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.00000: (drive a b) [2.00000]"));
}

#[test]
fn test_cli_parse_missing_file_fails() {
    wp_cmd()
        .args(["parse", "/nonexistent/plan.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_cli_happenings_conversion() {
    let dir = create_cli_test_environment();
    let plan = write_file(&dir, "out.plan", PLAN_TEXT);

    wp_cmd()
        .args(["happenings", plan.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0.00000: start (drive truck1 depot city)",
        ))
        .stdout(predicate::str::contains(
            "4.50000: end (drive truck1 depot city)",
        ))
        .stdout(predicate::str::contains("5.00000: (report)"));
}

#[test]
fn test_cli_plan_rebuild_round_trip() {
    let dir = create_cli_test_environment();
    let listing = write_file(
        &dir,
        "out.happenings",
        "0.00000: start (drive truck1 depot city)\n4.50000: end (drive truck1 depot city)\n",
    );

    wp_cmd()
        .args(["plan", listing.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0.00000: (drive truck1 depot city) [4.50000]",
        ));
}

#[test]
fn test_cli_plan_rejects_inconsistent_listing() {
    let dir = create_cli_test_environment();
    let listing = write_file(
        &dir,
        "broken.happenings",
        "4.50000: end (drive truck1 depot city)\n",
    );

    wp_cmd()
        .args(["plan", listing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("inconsistent"));
}

#[test]
fn test_cli_evaluate_missing_tool_fails() {
    let dir = create_cli_test_environment();
    let plan = write_file(&dir, "out.plan", PLAN_TEXT);
    let domain = write_file(&dir, "domain.pddl", "(define (domain d))");
    let problem = write_file(
        &dir,
        "problem.pddl",
        "(define (problem p) (:init (at truck1 depot)))",
    );

    wp_cmd()
        .args([
            "evaluate",
            plan.to_str().unwrap(),
            "--domain",
            domain.to_str().unwrap(),
            "--problem",
            problem.to_str().unwrap(),
            "--valstep",
            "/nonexistent/valstep",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ValStep session failed"));
}

#[test]
fn test_cli_help_lists_subcommands() {
    wp_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("happenings"))
        .stdout(predicate::str::contains("evaluate"));
}
