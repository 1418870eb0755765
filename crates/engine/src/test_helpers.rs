// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests

#![allow(clippy::unwrap_used)]

use crate::sink::{EmittedEvent, EventSink};
use aurelia_core::{EventKind, WorkflowConfig};
use tokio::sync::mpsc;

/// Small test configuration with distinctive stage commands so a
/// `FakeSandbox` can tell presubmit and evaluator runs apart.
pub(crate) fn test_config(termination: &str) -> WorkflowConfig {
    let yaml = format!(
        "\
termination_condition: \"{termination}\"
heartbeat_interval: 0.01
max_concurrent_tasks: 1
candidate_abandon_threshold: 4
coder:
  turn_budget: 8
presubmit:
  command: presubmit-check
  timeout: 5
evaluator:
  command: evaluate-run
  timeout: 5
"
    );
    WorkflowConfig::from_yaml(&yaml).unwrap()
}

/// Sink plus a receiver wide enough to buffer a whole candidate run.
pub(crate) fn collector() -> (EventSink, mpsc::Receiver<EmittedEvent>) {
    let (tx, rx) = mpsc::channel(256);
    (EventSink::new(tx), rx)
}

/// Drain every buffered event kind from the receiver.
pub(crate) fn drain_kinds(rx: &mut mpsc::Receiver<EmittedEvent>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(emitted) = rx.try_recv() {
        kinds.push(emitted.kind);
    }
    kinds
}

/// Names of the drained event kinds, for order assertions.
pub(crate) fn drain_names(rx: &mut mpsc::Receiver<EmittedEvent>) -> Vec<&'static str> {
    drain_kinds(rx).iter().map(|k| k.name()).collect()
}
