// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived runtime state, folded from the event log
//!
//! The event log is the ground truth; this projection is a pure, total
//! function of it. Replaying the log from an empty store reproduces the
//! live state exactly, so every fold here must be idempotent and must
//! tolerate unknown event kinds.

use aurelia_core::{
    Candidate, CandidateError, CandidateId, CandidateState, Event, EventKind, Stage,
    TerminationCondition,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Copy-on-read view of the runtime state.
///
/// Serializable so the engine can drop advisory snapshots under
/// `.aurelia/state/`; those files are hints, never ground truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    /// All candidates ever observed, keyed by id.
    pub candidates: BTreeMap<CandidateId, Candidate>,
    /// Candidates that have not reached a terminal state.
    pub active: BTreeSet<CandidateId>,
    /// Succeeded candidate ranking best on the primary metric.
    pub best: Option<CandidateId>,
    /// Failures since the last success. Aborts do not count.
    pub consecutive_failures: u32,
    /// Drain has begun; no further candidates will be created.
    pub stopping: bool,
    /// `runtime_stopped` has been written; the log is closed.
    pub stopped: bool,
    /// Highest event sequence number folded so far.
    pub last_seq: u64,
}

impl RuntimeSnapshot {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    /// The best-so-far candidate, if any has succeeded.
    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.best.and_then(|id| self.candidates.get(&id))
    }
}

/// The single mutable projection of the event log.
///
/// Mutated only from the scheduler task; everyone else reads snapshots.
#[derive(Debug)]
pub struct StateStore {
    termination: TerminationCondition,
    inner: RuntimeSnapshot,
}

impl StateStore {
    pub fn new(termination: TerminationCondition) -> Self {
        Self {
            termination,
            inner: RuntimeSnapshot::default(),
        }
    }

    /// Build a store by folding `events` in order.
    pub fn replay(termination: TerminationCondition, events: &[Event]) -> Self {
        let mut store = Self::new(termination);
        for event in events {
            store.apply(event);
        }
        store
    }

    pub fn termination(&self) -> &TerminationCondition {
        &self.termination
    }

    /// Cheap consistent view for readers.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.inner.clone()
    }

    pub fn current(&self) -> &RuntimeSnapshot {
        &self.inner
    }

    /// True once any succeeded candidate satisfies the termination
    /// condition. Checking the best-so-far is sufficient: it is extremal
    /// under the condition's own ranking.
    pub fn termination_satisfied(&self) -> bool {
        self.inner
            .best_candidate()
            .and_then(|c| c.metrics.as_ref())
            .map(|m| self.termination.satisfied_by(m))
            .unwrap_or(false)
    }

    /// Fold one event into the state.
    ///
    /// Total over all event kinds: unknown kinds advance `last_seq` and
    /// nothing else. Folds are idempotent so a record replayed twice
    /// produces the same state.
    pub fn apply(&mut self, event: &Event) {
        self.inner.last_seq = self.inner.last_seq.max(event.seq);

        match &event.kind {
            EventKind::RuntimeStarted => {
                // A restart reopens a log that may end in a stopped marker.
                self.inner.stopping = false;
                self.inner.stopped = false;
            }
            EventKind::RuntimeStopping => {
                self.inner.stopping = true;
            }
            EventKind::RuntimeStopped => {
                self.inner.stopped = true;
            }

            EventKind::CandidateCreated {
                parent_id,
                branch,
                worktree,
            } => {
                let Some(id) = event.candidate_id else {
                    return;
                };
                if self.inner.candidates.contains_key(&id) {
                    return;
                }
                self.inner.candidates.insert(
                    id,
                    Candidate::new(id, *parent_id, branch.clone(), worktree.clone(), event.ts),
                );
                self.inner.active.insert(id);
            }

            EventKind::CandidateStageStarted { stage } => {
                if let Some(candidate) = self.live_candidate_mut(event.candidate_id) {
                    candidate.state = match stage {
                        Stage::Coding => CandidateState::Coding,
                        Stage::Presubmit => CandidateState::Presubmitting,
                        Stage::Evaluating => CandidateState::Evaluating,
                    };
                }
            }

            // The stage result is recorded for the audit trail; candidate
            // state moves on the following stage start or terminal event.
            EventKind::CandidateStageFinished { .. } => {}

            EventKind::CandidateEvaluated { metrics } => {
                let Some(id) = event.candidate_id else {
                    return;
                };
                let ts = event.ts;
                let primary = self.termination.metric.clone();
                let Some(candidate) = self.live_candidate_mut(Some(id)) else {
                    return;
                };
                candidate.state = CandidateState::Succeeded;
                candidate.metrics = Some(metrics.clone());
                candidate.finished_at = Some(ts);
                let value = candidate.metric(&primary);

                self.inner.active.remove(&id);
                self.inner.consecutive_failures = 0;
                self.update_best(id, value);
            }

            EventKind::CandidateFailed { kind, message } => {
                let Some(id) = event.candidate_id else {
                    return;
                };
                let ts = event.ts;
                let Some(candidate) = self.live_candidate_mut(Some(id)) else {
                    return;
                };
                candidate.state = CandidateState::Failed;
                candidate.finished_at = Some(ts);
                candidate.error = Some(CandidateError {
                    kind: *kind,
                    message: message.clone(),
                });

                self.inner.active.remove(&id);
                self.inner.consecutive_failures += 1;
            }

            EventKind::CandidateAborted => {
                let Some(id) = event.candidate_id else {
                    return;
                };
                let ts = event.ts;
                let Some(candidate) = self.live_candidate_mut(Some(id)) else {
                    return;
                };
                candidate.state = CandidateState::Aborted;
                candidate.finished_at = Some(ts);

                self.inner.active.remove(&id);
            }

            // Audit-only events and forward-compatibility fallthrough
            EventKind::ToolInvoked { .. } | EventKind::LlmCall { .. } | EventKind::Unknown => {}
        }
    }

    /// Mutable access to a known, non-terminal candidate. Terminal
    /// candidates never transition again, which keeps folds idempotent.
    fn live_candidate_mut(&mut self, id: Option<CandidateId>) -> Option<&mut Candidate> {
        let id = id?;
        self.inner
            .candidates
            .get_mut(&id)
            .filter(|c| !c.is_terminal())
    }

    /// Replace best-so-far when `id` ranks strictly better on the primary
    /// metric. Ties keep the incumbent, which has the earlier
    /// `finished_at` because events fold in `seq` order.
    fn update_best(&mut self, id: CandidateId, value: Option<f64>) {
        let Some(value) = value else {
            return;
        };
        let current_best = self
            .inner
            .best
            .and_then(|b| self.inner.candidates.get(&b))
            .and_then(|c| c.metric(&self.termination.metric));

        let better = match current_best {
            Some(best) => self.termination.ranks_above(value, best),
            None => true,
        };
        if better {
            self.inner.best = Some(id);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
