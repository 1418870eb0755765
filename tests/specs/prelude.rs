// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.

#![allow(dead_code)]

use aurelia_adapters::{ChatResponse, FakeWorktrees, MockLlm, ProcessSandbox};
use aurelia_core::{Event, WorkflowConfig};
use aurelia_engine::{Engine, EngineDeps, EngineError, ProjectLayout, StopReason};
use aurelia_storage::read_events;
use serde_json::json;
use std::time::Duration;

/// Upper bound for any single engine run in these specs.
pub const SPEC_TIMEOUT: Duration = Duration::from_secs(10);

/// A temp project with an initialized `.aurelia/`, a problem statement,
/// fake worktrees, and a scripted model.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub layout: ProjectLayout,
    pub worktrees: FakeWorktrees,
    pub llm: MockLlm,
}

impl Project {
    /// Build a project whose `workflow.yaml` is exactly `config_yaml`.
    pub fn new(config_yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().to_owned());
        layout.init().unwrap();
        std::fs::write(dir.path().join("PROBLEM.md"), "Raise the accuracy metric.\n").unwrap();
        std::fs::write(layout.config_path(), config_yaml).unwrap();

        Self {
            worktrees: FakeWorktrees::new(layout.worktrees_dir()),
            llm: MockLlm::new(),
            layout,
            dir,
        }
    }

    pub fn engine(&self) -> Engine<FakeWorktrees, ProcessSandbox, MockLlm> {
        let config = WorkflowConfig::load(&self.layout.config_path()).unwrap();
        Engine::new(
            config,
            self.layout.clone(),
            EngineDeps {
                worktrees: self.worktrees.clone(),
                sandbox: ProcessSandbox::new(),
                llm: self.llm.clone(),
            },
        )
    }

    /// Run the engine to completion, bounded by [`SPEC_TIMEOUT`].
    pub async fn run(&self) -> Result<StopReason, EngineError> {
        tokio::time::timeout(SPEC_TIMEOUT, self.engine().run())
            .await
            .expect("engine run timed out")
    }

    pub fn events(&self) -> Vec<Event> {
        read_events(&self.layout.events_path()).unwrap().events
    }

    /// All event kind names in seq order.
    pub fn names(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.kind.name().to_string())
            .collect()
    }

    /// Event kind names for one candidate, in seq order.
    pub fn candidate_names(&self, id: u64) -> Vec<String> {
        self.events()
            .iter()
            .filter(|e| e.candidate_id.map(|c| c.as_u64()) == Some(id))
            .map(|e| e.kind.name().to_string())
            .collect()
    }

    /// Script one coder conversation: write `path` with `contents`, then
    /// finish.
    pub fn script_write_then_done(&self, path: &str, contents: &str) {
        self.llm.push(ChatResponse::tool_call(
            "write_file",
            json!({"path": path, "contents": contents}),
        ));
        self.llm.push(ChatResponse::done("done"));
    }
}

/// Config for single-candidate runs: instant heartbeat, trivially true
/// presubmit, metrics read back from a file the coder writes.
pub fn single_cycle_config(termination: &str) -> String {
    format!(
        "\
termination_condition: \"{termination}\"
heartbeat_interval: 0.01
max_concurrent_tasks: 1
candidate_abandon_threshold: 4
presubmit:
  command: \"true\"
  timeout: 5
evaluator:
  command: \"cat metrics.json\"
  timeout: 5
"
    )
}
