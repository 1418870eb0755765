// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate model: one improvement attempt

use crate::event::{FailureKind, Metrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Monotonic integer identifier for a candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CandidateId(pub u64);

impl CandidateId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CandidateId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a candidate.
///
/// `Succeeded`, `Failed`, and `Aborted` are terminal; a candidate never
/// re-enters an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    Preparing,
    Coding,
    Presubmitting,
    Evaluating,
    Succeeded,
    Failed,
    Aborted,
}

impl CandidateState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Succeeded | CandidateState::Failed | CandidateState::Aborted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateState::Preparing => "preparing",
            CandidateState::Coding => "coding",
            CandidateState::Presubmitting => "presubmitting",
            CandidateState::Evaluating => "evaluating",
            CandidateState::Succeeded => "succeeded",
            CandidateState::Failed => "failed",
            CandidateState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for CandidateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured failure of a candidate (kind plus human message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateError {
    pub kind: FailureKind,
    pub message: String,
}

/// One improvement attempt, owning a branch, a worktree, and a run of stages.
///
/// Mutated only through event folds in the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    /// The succeeded candidate whose branch this one forked from,
    /// or `None` when forked from the project HEAD.
    pub parent_id: Option<CandidateId>,
    pub branch: String,
    pub worktree: PathBuf,
    pub state: CandidateState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CandidateError>,
}

impl Candidate {
    pub fn new(
        id: CandidateId,
        parent_id: Option<CandidateId>,
        branch: String,
        worktree: PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent_id,
            branch,
            worktree,
            state: CandidateState::Preparing,
            created_at,
            finished_at: None,
            metrics: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Value of a named metric, if this candidate produced one.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.as_ref().and_then(|m| m.get(name).copied())
    }
}

#[cfg(test)]
#[path = "candidate_tests.rs"]
mod tests;
