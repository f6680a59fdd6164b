use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn cli_version() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&["-V"])
        .assert()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_all_tasks_succeed() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&["--size", "2", "--tasks", "8", "--work-ms", "5"])
        .assert()
        .success()
        .stdout(contains("ok=8 timeout=0 canceled=0 failed=0"));
}

#[test]
fn cli_reports_panics_as_failures() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&["-s", "2", "--tasks", "6", "--panic-every", "3"])
        .assert()
        .success()
        .stdout(contains("ok=4 timeout=0 canceled=0 failed=2"));
}

#[test]
fn cli_reports_timeouts() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&[
            "--size", "1", "--tasks", "3", "--work-ms", "800", "--timeout", "200",
        ])
        .assert()
        .success()
        .stdout(contains("ok=0 timeout=3"));
}

#[test]
fn cli_cancel_stops_pending_tasks() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&[
            "--size",
            "1",
            "--tasks",
            "4",
            "--work-ms",
            "500",
            "--cancel-after",
            "100",
        ])
        .assert()
        .success()
        .stdout(contains("ok=0 timeout=0 canceled=4 failed=0"));
}

#[test]
fn cli_rejects_empty_pool() {
    Command::cargo_bin("workpool")
        .unwrap()
        .args(&["--size", "0"])
        .assert()
        .failure();
}
