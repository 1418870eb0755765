// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery specs: torn logs and replay equality.

use crate::prelude::*;
use aurelia_core::{CandidateState, EventKind};
use aurelia_storage::{read_events, StateStore};

#[tokio::test]
async fn torn_log_recovery() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");
    project.run().await.unwrap();

    let path = project.layout.events_path();
    let intact = read_events(&path).unwrap().events;

    // Tear the last record mid-write, as a crash would.
    let content = std::fs::read(&path).unwrap();
    std::fs::write(&path, &content[..content.len() - 10]).unwrap();

    let scan = read_events(&path).unwrap();
    assert_eq!(scan.dropped, 1);
    assert_eq!(scan.events.len(), intact.len() - 1);
    assert_eq!(
        scan.events,
        &intact[..intact.len() - 1],
        "all records before the tear are authoritative"
    );

    // The projection still sees the whole run (only runtime_stopped fell
    // off the tail).
    let store = StateStore::replay("accuracy>=0.5".parse().unwrap(), &scan.events);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.candidates.len(), 1);
    assert_eq!(
        snapshot.candidates.values().next().unwrap().state,
        CandidateState::Succeeded
    );
}

#[tokio::test]
async fn replaying_the_log_reproduces_the_final_state() {
    let project = Project::new(&single_cycle_config("score>=0.9"));
    project.script_write_then_done("metrics.json", "{\"score\": 0.4}");
    project.script_write_then_done("metrics.json", "{\"score\": 0.95}");
    project.run().await.unwrap();

    let events = project.events();
    let store = StateStore::replay("score>=0.9".parse().unwrap(), &events);
    let snapshot = store.snapshot();

    assert_eq!(snapshot.candidates.len(), 2);
    assert_eq!(snapshot.active_count(), 0);
    assert_eq!(snapshot.best.map(|b| b.as_u64()), Some(2));
    assert!(snapshot.stopped);

    // Events for each candidate respect emission order (stage walk).
    for id in [1u64, 2] {
        let names = project.candidate_names(id);
        assert_eq!(names.first().map(String::as_str), Some("candidate_created"));
        assert_eq!(
            names.last().map(String::as_str),
            Some("candidate_evaluated")
        );
    }
}

#[tokio::test]
async fn restart_never_reuses_candidate_ids() {
    let project = Project::new(&single_cycle_config("accuracy>=0.5"));
    project.script_write_then_done("metrics.json", "{\"accuracy\": 1.0}");
    project.run().await.unwrap();

    let max_seq = project.events().last().unwrap().seq;

    // Second process over the same log, chasing a different metric.
    std::fs::write(
        project.layout.config_path(),
        single_cycle_config("latency<=0.5"),
    )
    .unwrap();
    project.script_write_then_done("metrics.json", "{\"latency\": 0.1}");
    project.run().await.unwrap();

    let ids: Vec<u64> = project
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::CandidateCreated { .. }))
        .map(|e| e.candidate_id.unwrap().as_u64())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], 1);
    assert!(ids[1] > max_seq, "restarted id must not collide with the log");
}
