// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project filesystem layout under `.aurelia/`
//!
//! ```text
//! .aurelia/
//!   config/workflow.yaml
//!   events.jsonl
//!   pid
//!   state/                      (advisory snapshots)
//!   worktrees/<candidate_id>/
//!   logs/<candidate_id>/{coder,presubmit,evaluator}.{stdout,stderr}
//! ```

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from `init`
#[derive(Debug, Error)]
pub enum InitError {
    #[error("already initialized: {0} exists")]
    AlreadyInitialized(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration written by `init` as a starting point.
const DEFAULT_CONFIG: &str = "\
# Aurelia workflow configuration.
# Only termination_condition is required; everything else has a default.

termination_condition: \"accuracy>=0.9\"

heartbeat_interval: 1.0
max_concurrent_tasks: 1
candidate_abandon_threshold: 4
dispatcher: default
problem_statement: PROBLEM.md

sandbox:
  image: aurelia-sandbox:latest
  env_allowlist: [GEMINI_API_KEY]

coder:
  model: gemini-2.0-flash
  turn_budget: 24

presubmit:
  command: pixi run test
  timeout: 300

evaluator:
  command: pixi run evaluate
  timeout: 900
";

/// Path helper for one project's `.aurelia/` directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aurelia_dir(&self) -> PathBuf {
        self.root.join(".aurelia")
    }

    pub fn config_path(&self) -> PathBuf {
        self.aurelia_dir().join("config").join("workflow.yaml")
    }

    pub fn events_path(&self) -> PathBuf {
        self.aurelia_dir().join("events.jsonl")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.aurelia_dir().join("state")
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.aurelia_dir().join("worktrees")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.aurelia_dir().join("logs")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.aurelia_dir().join("pid")
    }

    pub fn is_initialized(&self) -> bool {
        self.aurelia_dir().is_dir()
    }

    /// Create the `.aurelia/` skeleton. Fails if it already exists.
    pub fn init(&self) -> Result<(), InitError> {
        let dir = self.aurelia_dir();
        if dir.exists() {
            return Err(InitError::AlreadyInitialized(dir));
        }

        std::fs::create_dir_all(dir.join("config"))?;
        std::fs::create_dir_all(self.state_dir())?;
        std::fs::create_dir_all(self.worktrees_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::write(self.config_path(), DEFAULT_CONFIG)?;
        std::fs::write(self.events_path(), "")?;
        Ok(())
    }

    /// Record this process as the running engine.
    pub fn write_pid(&self) -> io::Result<()> {
        std::fs::write(self.pid_path(), format!("{}\n", std::process::id()))
    }

    /// PID of the running engine, if the pid file exists and parses.
    pub fn read_pid(&self) -> Option<i32> {
        let text = std::fs::read_to_string(self.pid_path()).ok()?;
        text.trim().parse().ok()
    }

    /// Best-effort pid file removal.
    pub fn remove_pid(&self) {
        let _ = std::fs::remove_file(self.pid_path());
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
