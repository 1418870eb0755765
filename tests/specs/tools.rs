// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool discipline specs: the capability surface stays inside the worktree.

use crate::prelude::*;
use aurelia_adapters::{ChatResponse, Role};
use aurelia_core::EventKind;
use aurelia_engine::StopReason;
use serde_json::json;

#[tokio::test]
async fn tool_path_escape_is_contained() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    // The model tries to read outside the worktree, is told no, and
    // finishes normally.
    project.llm.push(ChatResponse::tool_call(
        "read_file",
        json!({"path": "../../etc/passwd"}),
    ));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");

    let reason = project.run().await.unwrap();
    assert_eq!(reason, StopReason::ConditionMet);

    // No tool_invoked event was recorded for the rejected read.
    let invoked: Vec<String> = project
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::ToolInvoked { name, summary } => Some(format!("{name} {summary}")),
            _ => None,
        })
        .collect();
    assert_eq!(invoked.len(), 1);
    assert!(invoked[0].contains("metrics.json"));
    assert!(!invoked.iter().any(|s| s.contains("passwd")));

    // The model saw the rejection in-conversation.
    let requests = project.llm.requests();
    let saw_rejection = requests.iter().flatten().any(|m| {
        m.role == Role::Tool && m.content.contains("escapes the worktree")
    });
    assert!(saw_rejection);
}

#[tokio::test]
async fn escaping_write_leaves_host_untouched() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.llm.push(ChatResponse::tool_call(
        "write_file",
        json!({"path": "../../intruder.txt", "contents": "boo"}),
    ));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");

    project.run().await.unwrap();

    // Nothing landed outside the worktrees dir.
    assert!(!project.dir.path().join("intruder.txt").exists());
    assert!(!project.dir.path().join(".aurelia/intruder.txt").exists());
    assert!(!project.dir.path().parent().unwrap().join("intruder.txt").exists());
}

#[tokio::test]
async fn run_command_executes_inside_the_worktree() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.llm.push(ChatResponse::tool_call(
        "write_file",
        json!({"path": "metrics.json", "contents": "{\"accuracy\": 1.0}"}),
    ));
    project.llm.push(ChatResponse::tool_call(
        "run_command",
        json!({"argv": ["cat", "metrics.json"]}),
    ));
    project.llm.push(ChatResponse::done("verified"));

    project.run().await.unwrap();

    // The command's audit summary is recorded; the model received the
    // file contents as the tool result.
    let summaries: Vec<String> = project
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::ToolInvoked { name, summary } if name == "run_command" => {
                Some(summary.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].contains("cat metrics.json"));
    assert!(summaries[0].contains("exit 0"));

    let requests = project.llm.requests();
    let tool_result = requests
        .iter()
        .flatten()
        .filter(|m| m.role == Role::Tool)
        .last()
        .unwrap();
    assert!(tool_result.content.contains("accuracy"));
}
