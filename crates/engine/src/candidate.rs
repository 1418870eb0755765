// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-candidate state machine
//!
//! ```text
//! new → preparing → coding → presubmitting → evaluating → succeeded
//!                    │          │               │
//!                    │          │               └→ failed(eval_error|bad_metrics)
//!                    │          └→ failed(presubmit_fail)
//!                    └→ failed(coder_*)
//! any non-terminal ─→ aborted  (on shutdown)
//! ```
//!
//! Every transition is exactly one event through the sink; the task never
//! mutates shared state. Cancellation is observed at stage boundaries and
//! at sandbox/model await points, after which the single terminal event
//! is `candidate_aborted`.

use crate::coder::{run_coder, CoderSeed};
use crate::evaluator::{run_evaluator, EvalExit};
use crate::presubmit::run_presubmit;
use crate::sink::EventSink;
use crate::stage_log::StageLogger;
use aurelia_adapters::{
    LlmClient, ResponseCache, Sandbox, ToolServer, Worktree, WorktreeManager,
};
use aurelia_core::{
    CandidateId, EventKind, FailureKind, Stage, StageOutcome, WorkflowConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Terminal result of a stage, as seen by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StageExit {
    Completed,
    Failed { kind: FailureKind, message: String },
    Aborted,
}

/// Everything one candidate task owns.
pub struct CandidateContext<W, S, L> {
    pub id: CandidateId,
    /// Branch of the succeeded parent, or `None` to fork from HEAD.
    pub parent_ref: Option<String>,
    pub config: Arc<WorkflowConfig>,
    pub worktrees: W,
    pub sandbox: S,
    pub llm: L,
    pub cache: Arc<ResponseCache>,
    pub problem: Arc<String>,
    pub evaluator_context: Arc<String>,
    /// Digest of prior candidate outcomes at spawn time.
    pub history: String,
    pub env: Vec<(String, String)>,
    pub logger: StageLogger,
    pub sink: EventSink,
    pub shutdown: CancellationToken,
}

/// Drive one candidate from `preparing` to a terminal state.
///
/// All candidate-scoped errors are captured here and surface exactly once
/// as a `candidate_failed` (or `candidate_aborted`) event; nothing
/// escapes to the scheduler.
pub async fn run_candidate<W, S, L>(ctx: CandidateContext<W, S, L>)
where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    let id = ctx.id;

    // -- preparing --
    let parent_ref = match &ctx.parent_ref {
        Some(branch) => branch.clone(),
        None => match ctx.worktrees.head_ref().await {
            Ok(head) => head,
            Err(e) => {
                fail(&ctx, FailureKind::GitError, format!("resolve HEAD: {e}")).await;
                return;
            }
        },
    };

    if ctx.shutdown.is_cancelled() {
        abort(&ctx).await;
        return;
    }

    let worktree = tokio::select! {
        result = ctx.worktrees.create(id, &parent_ref) => match result {
            Ok(worktree) => worktree,
            Err(e) => {
                fail(&ctx, FailureKind::GitError, e.to_string()).await;
                return;
            }
        },
        _ = ctx.shutdown.cancelled() => {
            abort(&ctx).await;
            return;
        }
    };

    // -- coding --
    ctx.sink
        .emit(id, EventKind::CandidateStageStarted { stage: Stage::Coding })
        .await;

    let tools = ToolServer::new(
        worktree.path.clone(),
        ctx.sandbox.clone(),
        ctx.env.clone(),
        ctx.config.presubmit.timeout,
    );
    let seed = CoderSeed {
        problem: ctx.problem.as_ref().clone(),
        evaluator_context: ctx.evaluator_context.as_ref().clone(),
        history: ctx.history.clone(),
        dispatcher: ctx.config.dispatcher,
    };

    let coder = run_coder(
        &ctx.llm,
        &ctx.cache,
        &tools,
        &ctx.sink,
        id,
        &seed,
        ctx.config.coder.turn_budget,
        &ctx.shutdown,
    )
    .await;
    ctx.logger.write(id, Stage::Coding, &coder.transcript, "");

    match coder.exit {
        StageExit::Completed => {
            finish_stage(&ctx, Stage::Coding, StageOutcome::Passed).await;
        }
        StageExit::Failed { kind, message } => {
            finish_stage(&ctx, Stage::Coding, StageOutcome::Failed).await;
            fail(&ctx, kind, message).await;
            teardown(&ctx, &worktree, false).await;
            return;
        }
        StageExit::Aborted => {
            abort(&ctx).await;
            teardown(&ctx, &worktree, false).await;
            return;
        }
    }

    // -- presubmitting --
    ctx.sink
        .emit(
            id,
            EventKind::CandidateStageStarted {
                stage: Stage::Presubmit,
            },
        )
        .await;

    let (exit, run) = run_presubmit(
        &ctx.sandbox,
        &ctx.config.presubmit,
        &worktree.path,
        &ctx.env,
        &ctx.shutdown,
    )
    .await;
    if let Some(run) = &run {
        ctx.logger.write(id, Stage::Presubmit, &run.stdout, &run.stderr);
    }

    match exit {
        StageExit::Completed => {
            finish_stage(&ctx, Stage::Presubmit, StageOutcome::Passed).await;
        }
        StageExit::Failed { kind, message } => {
            finish_stage(&ctx, Stage::Presubmit, StageOutcome::Failed).await;
            fail(&ctx, kind, message).await;
            teardown(&ctx, &worktree, false).await;
            return;
        }
        StageExit::Aborted => {
            abort(&ctx).await;
            teardown(&ctx, &worktree, false).await;
            return;
        }
    }

    // -- evaluating --
    ctx.sink
        .emit(
            id,
            EventKind::CandidateStageStarted {
                stage: Stage::Evaluating,
            },
        )
        .await;

    let (exit, run) = run_evaluator(
        &ctx.sandbox,
        &ctx.config.evaluator,
        &worktree.path,
        &ctx.env,
        &ctx.config.termination.metric,
        &ctx.shutdown,
    )
    .await;
    if let Some(run) = &run {
        ctx.logger.write(id, Stage::Evaluating, &run.stdout, &run.stderr);
    }

    match exit {
        EvalExit::Succeeded(metrics) => {
            finish_stage(&ctx, Stage::Evaluating, StageOutcome::Passed).await;
            info!(candidate = %id, ?metrics, "candidate succeeded");
            ctx.sink
                .emit(id, EventKind::CandidateEvaluated { metrics })
                .await;
            // Success keeps the branch so children can fork from it.
            teardown(&ctx, &worktree, true).await;
        }
        EvalExit::Failed { kind, message } => {
            finish_stage(&ctx, Stage::Evaluating, StageOutcome::Failed).await;
            fail(&ctx, kind, message).await;
            teardown(&ctx, &worktree, false).await;
        }
        EvalExit::Aborted => {
            abort(&ctx).await;
            teardown(&ctx, &worktree, false).await;
        }
    }
}

async fn finish_stage<W, S, L>(
    ctx: &CandidateContext<W, S, L>,
    stage: Stage,
    outcome: StageOutcome,
) where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    ctx.sink
        .emit(ctx.id, EventKind::CandidateStageFinished { stage, outcome })
        .await;
}

async fn fail<W, S, L>(ctx: &CandidateContext<W, S, L>, kind: FailureKind, message: String)
where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    if kind == FailureKind::PresubmitFail {
        info!(candidate = %ctx.id, %kind, detail = %message, "candidate failed");
    } else {
        warn!(candidate = %ctx.id, %kind, detail = %message, "candidate failed");
    }
    ctx.sink
        .emit(ctx.id, EventKind::CandidateFailed { kind, message })
        .await;
}

async fn abort<W, S, L>(ctx: &CandidateContext<W, S, L>)
where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    info!(candidate = %ctx.id, "candidate aborted");
    ctx.sink.emit(ctx.id, EventKind::CandidateAborted).await;
}

async fn teardown<W, S, L>(ctx: &CandidateContext<W, S, L>, worktree: &Worktree, keep_branch: bool)
where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    if let Err(e) = ctx.worktrees.destroy(worktree, keep_branch).await {
        warn!(candidate = %ctx.id, error = %e, "worktree teardown failed");
    }
}

#[cfg(test)]
#[path = "candidate_tests.rs"]
mod tests;
