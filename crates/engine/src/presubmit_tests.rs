// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_adapters::{FakeSandbox, SandboxRun};
use std::time::Duration;

fn command() -> StageCommand {
    StageCommand {
        command: "presubmit-check".to_string(),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn zero_exit_passes() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = FakeSandbox::new();
    let token = CancellationToken::new();

    let (exit, run) = run_presubmit(&sandbox, &command(), dir.path(), &[], &token).await;

    assert_eq!(exit, StageExit::Completed);
    assert!(run.is_some());
}

#[tokio::test]
async fn nonzero_exit_fails_with_stderr_tail() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = FakeSandbox::new();
    sandbox.respond(
        "presubmit-check",
        SandboxRun::fail(1, "assertion failed: left == right"),
    );
    let token = CancellationToken::new();

    let (exit, _) = run_presubmit(&sandbox, &command(), dir.path(), &[], &token).await;

    match exit {
        StageExit::Failed { kind, message } => {
            assert_eq!(kind, FailureKind::PresubmitFail);
            assert!(message.contains("exit 1"));
            assert!(message.contains("assertion failed"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_fails() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = FakeSandbox::new();
    sandbox.respond("presubmit-check", SandboxRun::timeout());
    let token = CancellationToken::new();

    let (exit, _) = run_presubmit(&sandbox, &command(), dir.path(), &[], &token).await;

    match exit {
        StageExit::Failed { kind, message } => {
            assert_eq!(kind, FailureKind::PresubmitFail);
            assert!(message.contains("timed out"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = FakeSandbox::new();
    let token = CancellationToken::new();
    token.cancel();

    let (exit, run) = run_presubmit(&sandbox, &command(), dir.path(), &[], &token).await;

    assert_eq!(exit, StageExit::Aborted);
    assert!(run.is_none());
}

#[tokio::test]
async fn runs_in_the_worktree_with_forwarded_env() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = FakeSandbox::new();
    let token = CancellationToken::new();
    let env = vec![("GEMINI_API_KEY".to_string(), "k".to_string())];

    run_presubmit(&sandbox, &command(), dir.path(), &env, &token).await;

    let calls = sandbox.calls();
    assert_eq!(calls[0].worktree, dir.path());
    assert_eq!(calls[0].env, env);
}
