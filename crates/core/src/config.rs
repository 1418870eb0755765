// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow configuration loading
//!
//! Read once from `.aurelia/config/workflow.yaml` at startup and immutable
//! afterwards. Every field except `termination_condition` has a default.
//! Validation failures are fatal before any event is written.

use crate::termination::TerminationCondition;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating the workflow configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Coder prompt-building strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatcher {
    #[default]
    Default,
    Planner,
}

/// A stage command with its wall-clock timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCommand {
    pub command: String,
    pub timeout: Duration,
}

/// Sandbox settings: container image and environment allowlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub image: String,
    /// Names of host environment variables forwarded into the sandbox.
    pub env_allowlist: Vec<String>,
}

/// Coder stage settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CoderConfig {
    pub model: String,
    /// Maximum number of model turns before the stage fails.
    pub turn_budget: u32,
}

/// Immutable snapshot of the workflow configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub heartbeat_interval: Duration,
    pub max_concurrent_tasks: usize,
    pub termination: TerminationCondition,
    /// Consecutive failures since the last success that trigger drain.
    pub candidate_abandon_threshold: u32,
    pub dispatcher: Dispatcher,
    /// Path to the problem statement, relative to the project root.
    pub problem_statement: PathBuf,
    pub sandbox: SandboxConfig,
    pub coder: CoderConfig,
    pub presubmit: StageCommand,
    pub evaluator: StageCommand,
}

impl WorkflowConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        raw.validate()
    }
}

// -- raw deserialization layer (defaults + validation) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_heartbeat_interval")]
    heartbeat_interval: f64,
    #[serde(default = "default_max_concurrent_tasks")]
    max_concurrent_tasks: usize,
    termination_condition: TerminationCondition,
    #[serde(default = "default_abandon_threshold")]
    candidate_abandon_threshold: u32,
    #[serde(default)]
    dispatcher: Dispatcher,
    #[serde(default = "default_problem_statement")]
    problem_statement: PathBuf,
    #[serde(default)]
    sandbox: RawSandbox,
    #[serde(default)]
    coder: RawCoder,
    #[serde(default)]
    presubmit: RawStageCommand,
    #[serde(default = "RawStageCommand::evaluator")]
    evaluator: RawStageCommand,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSandbox {
    #[serde(default = "default_sandbox_image")]
    image: String,
    #[serde(default)]
    env_allowlist: Vec<String>,
}

impl Default for RawSandbox {
    fn default() -> Self {
        Self {
            image: default_sandbox_image(),
            env_allowlist: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCoder {
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_turn_budget")]
    turn_budget: u32,
}

impl Default for RawCoder {
    fn default() -> Self {
        Self {
            model: default_model(),
            turn_budget: default_turn_budget(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStageCommand {
    #[serde(default = "default_presubmit_command")]
    command: String,
    /// Seconds.
    #[serde(default = "default_presubmit_timeout")]
    timeout: u64,
}

impl Default for RawStageCommand {
    fn default() -> Self {
        Self {
            command: default_presubmit_command(),
            timeout: default_presubmit_timeout(),
        }
    }
}

impl RawStageCommand {
    fn evaluator() -> Self {
        Self {
            command: default_evaluator_command(),
            timeout: default_evaluator_timeout(),
        }
    }
}

fn default_heartbeat_interval() -> f64 {
    1.0
}
fn default_max_concurrent_tasks() -> usize {
    1
}
fn default_abandon_threshold() -> u32 {
    4
}
fn default_problem_statement() -> PathBuf {
    PathBuf::from("PROBLEM.md")
}
fn default_sandbox_image() -> String {
    "aurelia-sandbox:latest".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_turn_budget() -> u32 {
    24
}
fn default_presubmit_command() -> String {
    "pixi run test".to_string()
}
fn default_presubmit_timeout() -> u64 {
    300
}
fn default_evaluator_command() -> String {
    "pixi run evaluate".to_string()
}
fn default_evaluator_timeout() -> u64 {
    900
}

impl RawConfig {
    fn validate(self) -> Result<WorkflowConfig, ConfigError> {
        if !self.heartbeat_interval.is_finite() || self.heartbeat_interval <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat_interval",
                reason: format!("must be a positive number of seconds, got {}", self.heartbeat_interval),
            });
        }
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_tasks",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.candidate_abandon_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "candidate_abandon_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.coder.turn_budget == 0 {
            return Err(ConfigError::Invalid {
                field: "coder.turn_budget",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sandbox.image.is_empty() {
            return Err(ConfigError::Invalid {
                field: "sandbox.image",
                reason: "must not be empty".to_string(),
            });
        }
        for cmd in [&self.presubmit, &self.evaluator] {
            if cmd.command.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "presubmit/evaluator command",
                    reason: "must not be empty".to_string(),
                });
            }
            if cmd.timeout == 0 {
                return Err(ConfigError::Invalid {
                    field: "presubmit/evaluator timeout",
                    reason: "must be at least 1 second".to_string(),
                });
            }
        }

        Ok(WorkflowConfig {
            heartbeat_interval: Duration::from_secs_f64(self.heartbeat_interval),
            max_concurrent_tasks: self.max_concurrent_tasks,
            termination: self.termination_condition,
            candidate_abandon_threshold: self.candidate_abandon_threshold,
            dispatcher: self.dispatcher,
            problem_statement: self.problem_statement,
            sandbox: SandboxConfig {
                image: self.sandbox.image,
                env_allowlist: self.sandbox.env_allowlist,
            },
            coder: CoderConfig {
                model: self.coder.model,
                turn_budget: self.coder.turn_budget,
            },
            presubmit: StageCommand {
                command: self.presubmit.command,
                timeout: Duration::from_secs(self.presubmit.timeout),
            },
            evaluator: StageCommand {
                command: self.evaluator.command,
                timeout: Duration::from_secs(self.evaluator.timeout),
            },
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
