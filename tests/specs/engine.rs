// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine lifecycle specs: the literal scenarios of the runtime design.

use crate::prelude::*;
use aurelia_core::{CandidateId, EventKind, FailureKind, Stage};
use aurelia_engine::StopReason;
use aurelia_storage::read_events;
use serde_json::json;

#[tokio::test]
async fn happy_single_cycle() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");

    let reason = project.run().await.unwrap();
    assert_eq!(reason, StopReason::ConditionMet);

    // Exactly one candidate, id 1.
    let created: Vec<u64> = project
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::CandidateCreated { .. }))
        .map(|e| e.candidate_id.unwrap().as_u64())
        .collect();
    assert_eq!(created, vec![1]);

    // Coding, presubmit, and evaluating all pass in order.
    let names = project.candidate_names(1);
    assert_eq!(
        names,
        vec![
            "candidate_created",
            "candidate_stage_started",
            "llm_call",
            "tool_invoked",
            "llm_call",
            "candidate_stage_finished",
            "candidate_stage_started",
            "candidate_stage_finished",
            "candidate_stage_started",
            "candidate_stage_finished",
            "candidate_evaluated",
        ]
    );

    let evaluated = project
        .events()
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::CandidateEvaluated { metrics } => Some(metrics.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(evaluated.get("accuracy"), Some(&1.0));

    // Then the runtime drains and stops.
    let all = project.names();
    let stopping = all.iter().position(|n| n == "runtime_stopping").unwrap();
    let stopped = all.iter().position(|n| n == "runtime_stopped").unwrap();
    assert!(stopping < stopped);
    assert_eq!(stopped, all.len() - 1);
}

#[tokio::test]
async fn abandon_on_repeated_failure() {
    let config = "\
termination_condition: \"accuracy>=0.5\"
heartbeat_interval: 0.01
max_concurrent_tasks: 1
candidate_abandon_threshold: 2
presubmit:
  command: \"false\"
  timeout: 5
evaluator:
  command: \"cat metrics.json\"
  timeout: 5
";
    let project = Project::new(config);
    // The model always writes a file that fails presubmit.
    project.llm.set_fallback(aurelia_adapters::ChatResponse::done("wrote nothing useful"));

    let reason = project.run().await.unwrap();
    assert_eq!(reason, StopReason::Abandoned);

    let failures: Vec<u64> = project
        .events()
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::CandidateFailed {
                    kind: FailureKind::PresubmitFail,
                    ..
                }
            )
        })
        .map(|e| e.candidate_id.unwrap().as_u64())
        .collect();
    assert_eq!(failures, vec![1, 2]);

    // runtime_stopping follows; candidate 3 is never created.
    assert!(project.names().contains(&"runtime_stopping".to_string()));
    assert!(project.candidate_names(3).is_empty());
}

#[tokio::test]
async fn parent_reuse_follows_best_so_far() {
    let project = Project::new(&single_cycle_config("score>=0.9"));
    project.script_write_then_done("metrics.json", "{\"score\": 0.3}");
    project.script_write_then_done("metrics.json", "{\"score\": 0.7}");
    project.script_write_then_done("metrics.json", "{\"score\": 0.95}");

    let reason = project.run().await.unwrap();
    assert_eq!(reason, StopReason::ConditionMet);

    // Third candidate forks from candidate 2, the best so far.
    let parents: Vec<(u64, Option<u64>)> = project
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::CandidateCreated { parent_id, .. } => Some((
                e.candidate_id.unwrap().as_u64(),
                parent_id.map(|p| p.as_u64()),
            )),
            _ => None,
        })
        .collect();
    assert_eq!(parents, vec![(1, None), (2, Some(1)), (3, Some(2))]);

    // The checkout for candidate 3 descends from candidate 2's branch.
    assert_eq!(
        project.worktrees.created(),
        vec![
            (CandidateId(1), "HEAD".to_string()),
            (CandidateId(2), "aurelia/candidate-1".to_string()),
            (CandidateId(3), "aurelia/candidate-2".to_string()),
        ]
    );
}

#[tokio::test]
async fn graceful_shutdown_mid_coding() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.llm.push_stall();

    let engine = project.engine();
    let token = engine.shutdown_token();
    let events_path = project.layout.events_path();
    let handle = tokio::spawn(async move {
        tokio::time::timeout(SPEC_TIMEOUT, engine.run())
            .await
            .expect("engine run timed out")
    });

    // Wait until candidate 1 is in coding, then send the shutdown.
    let deadline = std::time::Instant::now() + SPEC_TIMEOUT;
    loop {
        let in_coding = read_events(&events_path).unwrap().events.iter().any(|e| {
            matches!(
                e.kind,
                EventKind::CandidateStageStarted {
                    stage: Stage::Coding
                }
            )
        });
        if in_coding {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "coding never started");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    token.cancel();

    let reason = handle.await.unwrap().unwrap();
    assert_eq!(reason, StopReason::ShutdownSignal);

    let names = project.candidate_names(1);
    assert_eq!(names.last().map(String::as_str), Some("candidate_aborted"));
    assert!(!names.contains(&"candidate_evaluated".to_string()));
    assert_eq!(project.names().last().map(String::as_str), Some("runtime_stopped"));
}

#[tokio::test]
async fn no_events_follow_runtime_stopped() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");

    project.run().await.unwrap();

    let events = project.events();
    let stopped_seq = events
        .iter()
        .find(|e| matches!(e.kind, EventKind::RuntimeStopped))
        .unwrap()
        .seq;
    assert!(events.iter().all(|e| e.seq <= stopped_seq));
}

#[tokio::test]
async fn coder_turn_budget_exhaustion_fails_candidate() {
    let config = "\
termination_condition: \"accuracy>=0.5\"
heartbeat_interval: 0.01
max_concurrent_tasks: 1
candidate_abandon_threshold: 1
coder:
  turn_budget: 2
presubmit:
  command: \"true\"
  timeout: 5
evaluator:
  command: \"cat metrics.json\"
  timeout: 5
";
    let project = Project::new(config);
    // The model never stops calling tools.
    project.llm.set_fallback(aurelia_adapters::ChatResponse::tool_call(
        "write_file",
        json!({"path": "again.txt", "contents": "x"}),
    ));

    let reason = project.run().await.unwrap();
    assert_eq!(reason, StopReason::Abandoned);

    let failed = project
        .events()
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::CandidateFailed { kind, .. } => Some(*kind),
            _ => None,
        })
        .unwrap();
    assert_eq!(failed, FailureKind::CoderTurnBudget);
}
