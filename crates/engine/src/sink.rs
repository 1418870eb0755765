// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate → scheduler event channel
//!
//! Candidate tasks never touch the event log or state store directly.
//! They send `(candidate, kind)` pairs here; the scheduler task assigns
//! sequence numbers, appends durably, and folds the result. A bounded
//! channel makes each emit an await point, and per-sender FIFO keeps one
//! candidate's events in emission order.

use aurelia_core::{CandidateId, EventKind};
use tokio::sync::mpsc;

/// An event emitted by a candidate task, before sequencing.
#[derive(Debug)]
pub struct EmittedEvent {
    pub candidate_id: Option<CandidateId>,
    pub kind: EventKind,
}

/// Sending half handed to each candidate task.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EmittedEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<EmittedEvent>) -> Self {
        Self { tx }
    }

    /// Emit an event for a candidate. Send failure means the scheduler is
    /// gone, in which case there is nobody left to record for.
    pub async fn emit(&self, candidate_id: CandidateId, kind: EventKind) {
        let _ = self
            .tx
            .send(EmittedEvent {
                candidate_id: Some(candidate_id),
                kind,
            })
            .await;
    }
}
