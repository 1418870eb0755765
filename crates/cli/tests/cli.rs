// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface specs: exit codes and basic flows of the `aurelia` binary.

use assert_cmd::Command;
use std::path::Path;

fn aurelia(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::cargo_bin("aurelia")
        .expect("aurelia binary built")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("aurelia ran");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn init_creates_skeleton_then_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();

    let (code, _, _) = aurelia(dir.path(), &["init"]);
    assert_eq!(code, 0);
    assert!(dir.path().join(".aurelia/config/workflow.yaml").is_file());
    assert!(dir.path().join(".aurelia/events.jsonl").is_file());
    assert!(dir.path().join(".aurelia/worktrees").is_dir());
    assert!(dir.path().join(".aurelia/logs").is_dir());

    let (code, _, stderr) = aurelia(dir.path(), &["init"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("already initialized"));
}

#[test]
fn status_always_exits_zero() {
    let dir = tempfile::tempdir().unwrap();

    // Even before init there is a (trivial) projection to print.
    let (code, stdout, _) = aurelia(dir.path(), &["status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("runtime: idle"));

    aurelia(dir.path(), &["init"]);
    let (code, stdout, _) = aurelia(dir.path(), &["status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("candidates: 0 total"));
}

#[test]
fn stop_without_running_engine_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    aurelia(dir.path(), &["init"]);

    let (code, _, stderr) = aurelia(dir.path(), &["stop"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("not running"));
}

#[test]
fn start_requires_initialization() {
    let dir = tempfile::tempdir().unwrap();

    let (code, _, stderr) = aurelia(dir.path(), &["start"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not initialized"));
}

#[test]
fn start_with_invalid_config_fails_before_writing_events() {
    let dir = tempfile::tempdir().unwrap();
    aurelia(dir.path(), &["init"]);
    std::fs::write(
        dir.path().join(".aurelia/config/workflow.yaml"),
        "termination_condition: \"accuracy about 0.9\"\n",
    )
    .unwrap();

    let (code, _, stderr) = aurelia(dir.path(), &["start", "--mock"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("invalid"));

    let events = std::fs::read_to_string(dir.path().join(".aurelia/events.jsonl")).unwrap();
    assert!(events.is_empty(), "config_invalid must write no events");
}

#[test]
fn report_on_fresh_project() {
    let dir = tempfile::tempdir().unwrap();
    aurelia(dir.path(), &["init"]);

    let (code, stdout, _) = aurelia(dir.path(), &["report"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("events: 0"));
}
