// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-scoped errors
//!
//! Candidate-scoped failures never appear here: they resolve to
//! `candidate_failed` events inside the candidate task. Anything that
//! reaches this type drains the engine with a nonzero exit.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of the engine itself
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] aurelia_core::ConfigError),

    #[error("event log write failed: {0}")]
    LogWrite(#[from] aurelia_storage::LogError),

    #[error("cannot read problem statement {path}: {source}")]
    ProblemStatement {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("sandbox unavailable after repeated probes: {0}")]
    SandboxUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
