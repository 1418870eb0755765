// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event records for the append-only runtime log
//!
//! Every state change in the runtime is an [`Event`] appended to
//! `events.jsonl`. The in-memory state is a pure fold over these records,
//! so the set of kinds here is the complete vocabulary of the system.
//!
//! Wire format is one JSON object per line:
//! `{"seq":N,"ts":"…","candidate_id":N,"kind":"…","payload":{…}}`
//! with `candidate_id` and `payload` optional. Unknown kinds deserialize
//! to [`EventKind::Unknown`] so older binaries can read newer logs.

use crate::candidate::CandidateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metric name → value map produced by the evaluator.
pub type Metrics = BTreeMap<String, f64>;

/// A bounded phase of a candidate's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Coding,
    Presubmit,
    Evaluating,
}

impl Stage {
    /// Stage name as it appears in event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Coding => "coding",
            Stage::Presubmit => "presubmit",
            Stage::Evaluating => "evaluating",
        }
    }

    /// Basename used for the per-candidate capture files
    /// (`logs/<id>/{coder,presubmit,evaluator}.{stdout,stderr}`).
    pub fn log_name(&self) -> &'static str {
        match self {
            Stage::Coding => "coder",
            Stage::Presubmit => "presubmit",
            Stage::Evaluating => "evaluator",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Passed,
    Failed,
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Passed => f.write_str("passed"),
            StageOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Candidate-scoped failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Worktree or branch operation failed while preparing the candidate.
    GitError,
    /// The coder conversation exhausted its turn budget.
    CoderTurnBudget,
    /// A tool invocation (or the model call itself) failed fatally.
    CoderToolError,
    /// The presubmit check exited nonzero. An expected outcome, not an error.
    PresubmitFail,
    /// The evaluator exited nonzero or produced no parseable metrics.
    EvalError,
    /// The evaluator produced metrics that are unusable for ranking.
    BadMetrics,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::GitError => "git_error",
            FailureKind::CoderTurnBudget => "coder_turn_budget",
            FailureKind::CoderToolError => "coder_tool_error",
            FailureKind::PresubmitFail => "presubmit_fail",
            FailureKind::EvalError => "eval_error",
            FailureKind::BadMetrics => "bad_metrics",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened, without the envelope.
///
/// Serializes as `"kind"` plus an optional `"payload"` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    // -- runtime --
    RuntimeStarted,
    RuntimeStopping,
    RuntimeStopped,

    // -- candidate lifecycle --
    CandidateCreated {
        parent_id: Option<CandidateId>,
        branch: String,
        worktree: PathBuf,
    },
    CandidateStageStarted {
        stage: Stage,
    },
    CandidateStageFinished {
        stage: Stage,
        outcome: StageOutcome,
    },
    CandidateEvaluated {
        metrics: Metrics,
    },
    CandidateFailed {
        kind: FailureKind,
        message: String,
    },
    CandidateAborted,

    // -- audit trail --
    ToolInvoked {
        name: String,
        summary: String,
    },
    LlmCall {
        tokens_in: u64,
        tokens_out: u64,
        cached: bool,
    },

    /// Catch-all for unknown event kinds (forward compatibility)
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Kind tag for logs and display.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RuntimeStarted => "runtime_started",
            EventKind::RuntimeStopping => "runtime_stopping",
            EventKind::RuntimeStopped => "runtime_stopped",
            EventKind::CandidateCreated { .. } => "candidate_created",
            EventKind::CandidateStageStarted { .. } => "candidate_stage_started",
            EventKind::CandidateStageFinished { .. } => "candidate_stage_finished",
            EventKind::CandidateEvaluated { .. } => "candidate_evaluated",
            EventKind::CandidateFailed { .. } => "candidate_failed",
            EventKind::CandidateAborted => "candidate_aborted",
            EventKind::ToolInvoked { .. } => "tool_invoked",
            EventKind::LlmCall { .. } => "llm_call",
            EventKind::Unknown => "unknown",
        }
    }

    /// True for the single event that ends a candidate's life.
    pub fn is_candidate_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::CandidateEvaluated { .. }
                | EventKind::CandidateFailed { .. }
                | EventKind::CandidateAborted
        )
    }
}

/// One immutable record of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number assigned by the log writer.
    pub seq: u64,
    /// Wall-clock timestamp (RFC 3339).
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<CandidateId>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// One-line human rendering for `monitor` output and tracing.
    pub fn log_summary(&self) -> String {
        let who = match self.candidate_id {
            Some(id) => format!(" candidate={}", id),
            None => String::new(),
        };
        let detail = match &self.kind {
            EventKind::CandidateCreated {
                parent_id, branch, ..
            } => match parent_id {
                Some(p) => format!(" parent={} branch={}", p, branch),
                None => format!(" branch={}", branch),
            },
            EventKind::CandidateStageStarted { stage } => format!(" stage={}", stage),
            EventKind::CandidateStageFinished { stage, outcome } => {
                format!(" stage={} outcome={}", stage, outcome)
            }
            EventKind::CandidateEvaluated { metrics } => {
                let rendered: Vec<String> =
                    metrics.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!(" metrics[{}]", rendered.join(","))
            }
            EventKind::CandidateFailed { kind, message } => {
                format!(" kind={} message={:?}", kind, message)
            }
            EventKind::ToolInvoked { name, summary } => format!(" tool={} {}", name, summary),
            EventKind::LlmCall {
                tokens_in,
                tokens_out,
                cached,
            } => format!(" in={} out={} cached={}", tokens_in, tokens_out, cached),
            _ => String::new(),
        };
        format!("seq={} {}{}{}", self.seq, self.kind.name(), who, detail)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
