// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aurelia-engine: heartbeat orchestration of candidate lifecycles
//!
//! The engine owns the event log and state store, spawns candidates as
//! cooperative tasks up to the concurrency limit, drives each through the
//! coder/presubmit/evaluator stages, and drains gracefully on a satisfied
//! termination condition, repeated failure, or operator signal.

#[cfg(test)]
pub(crate) mod test_helpers;

pub mod candidate;
pub mod coder;
pub mod error;
pub mod evaluator;
pub mod heartbeat;
pub mod layout;
pub mod presubmit;
pub mod signal;
pub mod sink;
pub mod stage_log;

pub use candidate::StageExit;
pub use error::EngineError;
pub use heartbeat::{Engine, EngineDeps, StopReason};
pub use layout::{InitError, ProjectLayout};
pub use sink::{EmittedEvent, EventSink};
pub use stage_log::StageLogger;
