//! End-to-end CLI tests via the compiled binary: request validation order,
//! exit codes, and help output. No network calls are made; every scenario
//! fails before a remote client would be used.

use assert_cmd::Command;
use predicates::prelude::*;

fn costscope() -> Command {
    let mut cmd = Command::cargo_bin("costscope").expect("binary builds");
    // Make credential resolution deterministic regardless of the host env.
    cmd.env_remove("COSTSCOPE_ACCESS_TOKEN");
    cmd.env_remove("AZURE_ACCESS_TOKEN");
    cmd.env_remove("COSTSCOPE_CONFIG");
    cmd
}

#[test]
fn help_lists_the_commands() {
    costscope()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("cost"));
}

#[test]
fn no_command_prints_the_quickstart() {
    costscope()
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

#[test]
fn cost_without_subscription_id_is_an_invalid_request() {
    costscope()
        .arg("cost")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("subscription_id is required"));
}

#[test]
fn cost_with_unknown_query_type_names_the_valid_set() {
    costscope()
        .args(["cost", "--subscription-id", "sub-1", "--query-type", "weird"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("specific_resources"));
}

#[test]
fn cost_with_bad_date_is_an_invalid_request() {
    costscope()
        .args([
            "cost",
            "--subscription-id",
            "sub-1",
            "--start-date",
            "07/01/2026",
            "--end-date",
            "2026-07-31",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn valid_cost_request_without_credential_fails_with_config_exit() {
    // Request validation passes; credential resolution is the next gate.
    costscope()
        .args(["cost", "--subscription-id", "sub-1", "--top-n", "5"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("credential not configured"));
}

#[test]
fn completions_generate_for_bash() {
    costscope()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("costscope"));
}
