// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia status`: one-shot projection of the event log

use aurelia_core::{TerminationCondition, WorkflowConfig};
use aurelia_engine::ProjectLayout;
use aurelia_storage::{read_events, RuntimeSnapshot, StateStore};
use std::path::Path;

pub fn run(root: &Path) -> i32 {
    let layout = ProjectLayout::new(root.to_owned());

    // Best-effort: status always exits 0, even on a damaged or missing
    // log, so it is safe in scripts and prompts.
    let termination = WorkflowConfig::load(&layout.config_path())
        .map(|c| c.termination)
        .unwrap_or_else(|_| TerminationCondition::never());

    let scan = match read_events(&layout.events_path()) {
        Ok(scan) => scan,
        Err(e) => {
            eprintln!("error: cannot read event log: {e}");
            return 0;
        }
    };
    if scan.dropped > 0 {
        eprintln!("note: dropped {} torn trailing record(s)", scan.dropped);
    }

    let store = StateStore::replay(termination.clone(), &scan.events);
    print!("{}", render_status(&store.snapshot(), &termination));
    0
}

fn runtime_phase(snapshot: &RuntimeSnapshot) -> &'static str {
    if snapshot.stopped {
        "stopped"
    } else if snapshot.stopping {
        "draining"
    } else if snapshot.last_seq > 0 {
        "running"
    } else {
        "idle"
    }
}

pub(crate) fn render_status(
    snapshot: &RuntimeSnapshot,
    termination: &TerminationCondition,
) -> String {
    use aurelia_core::CandidateState;

    let mut counts = [0usize; 3];
    for candidate in snapshot.candidates.values() {
        match candidate.state {
            CandidateState::Succeeded => counts[0] += 1,
            CandidateState::Failed => counts[1] += 1,
            CandidateState::Aborted => counts[2] += 1,
            _ => {}
        }
    }

    let mut out = String::new();
    out.push_str(&format!("runtime: {}\n", runtime_phase(snapshot)));
    out.push_str(&format!(
        "candidates: {} total, {} active, {} succeeded, {} failed, {} aborted\n",
        snapshot.candidates.len(),
        snapshot.active_count(),
        counts[0],
        counts[1],
        counts[2],
    ));
    out.push_str(&format!(
        "consecutive failures: {}\n",
        snapshot.consecutive_failures
    ));

    match snapshot.best_candidate() {
        Some(best) => {
            let value = best
                .metric(&termination.metric)
                .map(|v| format!("{}={v}", termination.metric))
                .unwrap_or_default();
            out.push_str(&format!("best: candidate {} ({value})\n", best.id));
        }
        None => out.push_str("best: none\n"),
    }

    if !snapshot.candidates.is_empty() {
        out.push_str("\n  id  state          parent  result\n");
        for candidate in snapshot.candidates.values() {
            let parent = candidate
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let result = match (&candidate.metrics, &candidate.error) {
                (Some(metrics), _) => metrics
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" "),
                (None, Some(error)) => format!("{}", error.kind),
                (None, None) => String::new(),
            };
            out.push_str(&format!(
                "  {:>2}  {:<13}  {:>6}  {}\n",
                candidate.id, candidate.state, parent, result
            ));
        }
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
