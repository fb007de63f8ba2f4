#![allow(missing_docs)]
#![allow(unused_results)]

use assert_cmd::Command;
use predicates::prelude::*;

fn procscope_cmd() -> Command {
    Command::cargo_bin("procscope").unwrap()
}

#[test]
fn test_help() {
    procscope_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--list")
                .and(predicate::str::contains("--pid"))
                .and(predicate::str::contains("--toggle-modules")),
        );
}

#[test]
fn test_list_and_pid_conflict() {
    procscope_cmd()
        .args(["--list", "--pid", "1"])
        .assert()
        .failure();
}

#[test]
fn test_report_for_unusable_pid_fails() {
    // Either the pid does not exist or the platform is unsupported; both
    // surface as an inline failure and a non-zero exit code.
    procscope_cmd()
        .args(["--pid", "18446744073709551615"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed to get the title id"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_list_contains_own_pid() {
    let pid = std::process::id();
    procscope_cmd()
        .args(["--list", "--process-capacity", "1000000"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(format!("(?m): pid {pid}$")).unwrap());
}

#[cfg(target_os = "linux")]
#[test]
fn test_list_truncation_is_warned() {
    procscope_cmd()
        .args(["--list", "--process-capacity", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("#0: pid ")
                .and(predicate::str::contains("extra processes are not shown")),
        );
}

#[cfg(target_os = "linux")]
#[test]
fn test_one_shot_report_own_process() {
    let pid = std::process::id().to_string();
    procscope_cmd()
        .args(["--pid", &pid])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Process ID [#0]:")
                .and(predicate::str::contains("Base Address:"))
                .and(predicate::str::contains("Permissions:")),
        );
}
