// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluator stage: run the evaluation command and parse its metrics

use aurelia_adapters::{Sandbox, SandboxRun};
use aurelia_core::{parse_metrics, FailureKind, Metrics, StageCommand};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Stderr characters carried into the failure message.
const STDERR_TAIL: usize = 500;

/// Terminal result of the evaluator stage.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalExit {
    Succeeded(Metrics),
    Failed { kind: FailureKind, message: String },
    Aborted,
}

/// Run the evaluation command and extract the metrics map.
///
/// The last stdout line parsing as a JSON object with numeric leaves is
/// the metrics map. A run without one is `eval_error`; metrics missing
/// the primary metric are `bad_metrics`.
pub async fn run_evaluator<S: Sandbox>(
    sandbox: &S,
    command: &StageCommand,
    worktree: &Path,
    env: &[(String, String)],
    primary_metric: &str,
    shutdown: &CancellationToken,
) -> (EvalExit, Option<SandboxRun>) {
    if shutdown.is_cancelled() {
        return (EvalExit::Aborted, None);
    }
    let run = tokio::select! {
        result = sandbox.run(&command.command, worktree, env, command.timeout) => result,
        _ = shutdown.cancelled() => return (EvalExit::Aborted, None),
    };

    let run = match run {
        Ok(run) => run,
        Err(e) => {
            return (
                EvalExit::Failed {
                    kind: FailureKind::EvalError,
                    message: format!("sandbox: {e}"),
                },
                None,
            );
        }
    };

    let exit = if run.timed_out {
        EvalExit::Failed {
            kind: FailureKind::EvalError,
            message: format!("timed out after {}s", command.timeout.as_secs()),
        }
    } else if !run.success() {
        EvalExit::Failed {
            kind: FailureKind::EvalError,
            message: format!("exit {}: {}", run.exit_code, run.stderr_tail(STDERR_TAIL)),
        }
    } else {
        match parse_metrics(&run.stdout) {
            None => EvalExit::Failed {
                kind: FailureKind::EvalError,
                message: "no metrics object in evaluator output".to_string(),
            },
            Some(metrics) if !metrics.contains_key(primary_metric) => EvalExit::Failed {
                kind: FailureKind::BadMetrics,
                message: format!("metrics missing primary metric {primary_metric:?}"),
            },
            Some(metrics) => EvalExit::Succeeded(metrics),
        }
    };

    (exit, Some(run))
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
