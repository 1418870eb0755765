// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presubmit stage: run the configured check command in the worktree

use crate::candidate::StageExit;
use aurelia_adapters::{Sandbox, SandboxRun};
use aurelia_core::{FailureKind, StageCommand};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Stderr characters carried into the failure message.
const STDERR_TAIL: usize = 500;

/// Run the presubmit check. Pass iff the command exits zero.
///
/// A nonzero exit is an expected outcome, not an error. The captured run
/// is returned alongside the exit for the stage log.
pub async fn run_presubmit<S: Sandbox>(
    sandbox: &S,
    command: &StageCommand,
    worktree: &Path,
    env: &[(String, String)],
    shutdown: &CancellationToken,
) -> (StageExit, Option<SandboxRun>) {
    if shutdown.is_cancelled() {
        return (StageExit::Aborted, None);
    }
    let run = tokio::select! {
        result = sandbox.run(&command.command, worktree, env, command.timeout) => result,
        _ = shutdown.cancelled() => return (StageExit::Aborted, None),
    };

    let run = match run {
        Ok(run) => run,
        Err(e) => {
            return (
                StageExit::Failed {
                    kind: FailureKind::PresubmitFail,
                    message: format!("sandbox: {e}"),
                },
                None,
            );
        }
    };

    let exit = if run.timed_out {
        StageExit::Failed {
            kind: FailureKind::PresubmitFail,
            message: format!("timed out after {}s", command.timeout.as_secs()),
        }
    } else if run.success() {
        StageExit::Completed
    } else {
        info!(exit_code = run.exit_code, "presubmit check failed");
        StageExit::Failed {
            kind: FailureKind::PresubmitFail,
            message: format!("exit {}: {}", run.exit_code, run.stderr_tail(STDERR_TAIL)),
        }
    };

    (exit, Some(run))
}

#[cfg(test)]
#[path = "presubmit_tests.rs"]
mod tests;
