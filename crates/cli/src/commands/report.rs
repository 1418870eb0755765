// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia report`: aggregate view of a run's event log

use aurelia_core::{Event, EventKind, TerminationCondition, WorkflowConfig};
use aurelia_engine::ProjectLayout;
use aurelia_storage::{read_events, StateStore};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(root: &Path) -> i32 {
    let layout = ProjectLayout::new(root.to_owned());

    let termination = WorkflowConfig::load(&layout.config_path())
        .map(|c| c.termination)
        .unwrap_or_else(|_| TerminationCondition::never());

    let scan = match read_events(&layout.events_path()) {
        Ok(scan) => scan,
        Err(e) => {
            eprintln!("error: cannot read event log: {e}");
            return 1;
        }
    };

    print!("{}", render_report(&scan.events, &termination));
    0
}

pub(crate) fn render_report(events: &[Event], termination: &TerminationCondition) -> String {
    let store = StateStore::replay(termination.clone(), events);
    let snapshot = store.snapshot();

    let mut failure_kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut llm_calls = 0usize;
    let mut cached_calls = 0usize;
    let mut tokens_in = 0u64;
    let mut tokens_out = 0u64;
    let mut tool_invocations = 0usize;

    for event in events {
        match &event.kind {
            EventKind::CandidateFailed { kind, .. } => {
                *failure_kinds.entry(kind.as_str()).or_default() += 1;
            }
            EventKind::LlmCall {
                tokens_in: t_in,
                tokens_out: t_out,
                cached,
            } => {
                llm_calls += 1;
                if *cached {
                    cached_calls += 1;
                }
                tokens_in += t_in;
                tokens_out += t_out;
            }
            EventKind::ToolInvoked { .. } => tool_invocations += 1,
            _ => {}
        }
    }

    let mut out = String::new();
    out.push_str(&format!("events: {}\n", events.len()));
    out.push_str(&format!("candidates: {}\n", snapshot.candidates.len()));

    if !failure_kinds.is_empty() {
        out.push_str("failures:\n");
        for (kind, count) in &failure_kinds {
            out.push_str(&format!("  {kind}: {count}\n"));
        }
    }

    out.push_str(&format!(
        "llm calls: {llm_calls} ({cached_calls} cached), tokens in/out: {tokens_in}/{tokens_out}\n"
    ));
    out.push_str(&format!("tool invocations: {tool_invocations}\n"));

    match snapshot.best_candidate() {
        Some(best) => {
            let metrics = best
                .metrics
                .as_ref()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            out.push_str(&format!(
                "best: candidate {} on branch {} ({metrics})\n",
                best.id, best.branch
            ));
        }
        None => out.push_str("best: none\n"),
    }
    out
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
