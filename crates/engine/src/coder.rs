// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coder stage: drive the model and its tools until the solution is edited
//!
//! The conversation is seeded with the problem statement, the evaluator
//! context, and a digest of prior candidate outcomes. Each turn either
//! ends the stage (no tool calls), spends tool invocations, or fails.
//! Failures never raise out of the stage; they resolve to a
//! [`StageExit`].

use crate::candidate::StageExit;
use crate::sink::EventSink;
use aurelia_adapters::{
    ChatMessage, LlmClient, ResponseCache, Sandbox, ToolServer,
};
use aurelia_core::{CandidateId, Dispatcher, EventKind, FailureKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const BASE_SYSTEM_PROMPT: &str = "\
You are an autonomous coding agent improving a project inside an isolated \
working copy. Use the provided tools to inspect and edit files and to run \
commands. When the solution is complete, reply without any tool call. \
Your changes are judged by the project's evaluation script.";

const PLANNER_PREAMBLE: &str = "\
Before editing, lay out a short plan of the changes you intend to make, \
then carry it out step by step.\n\n";

/// Result of the coder stage, with the conversation transcript for the
/// capture file.
#[derive(Debug)]
pub struct CoderRun {
    pub exit: StageExit,
    pub transcript: String,
}

/// Static seed material shared by all turns.
#[derive(Debug, Clone)]
pub struct CoderSeed {
    pub problem: String,
    pub evaluator_context: String,
    pub history: String,
    pub dispatcher: Dispatcher,
}

/// Build the opening conversation from the seed.
pub fn seed_messages(seed: &CoderSeed) -> Vec<ChatMessage> {
    let system = match seed.dispatcher {
        Dispatcher::Default => BASE_SYSTEM_PROMPT.to_string(),
        Dispatcher::Planner => format!("{PLANNER_PREAMBLE}{BASE_SYSTEM_PROMPT}"),
    };

    let user = format!(
        "# Problem statement\n\n{}\n\n# Evaluation\n\n{}\n\n# Prior candidates\n\n{}\n",
        seed.problem.trim(),
        seed.evaluator_context.trim(),
        seed.history.trim(),
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Run the bounded conversation loop.
#[allow(clippy::too_many_arguments)]
pub async fn run_coder<S: Sandbox, L: LlmClient>(
    llm: &L,
    cache: &ResponseCache,
    tools: &ToolServer<S>,
    sink: &EventSink,
    candidate_id: CandidateId,
    seed: &CoderSeed,
    turn_budget: u32,
    shutdown: &CancellationToken,
) -> CoderRun {
    let tool_defs = ToolServer::<S>::tool_defs();
    let mut messages = seed_messages(seed);
    let mut transcript = String::new();

    for turn in 0..turn_budget {
        if shutdown.is_cancelled() {
            return CoderRun {
                exit: StageExit::Aborted,
                transcript,
            };
        }

        let result = tokio::select! {
            result = cache.chat(llm, &messages, &tool_defs) => result,
            _ = shutdown.cancelled() => {
                return CoderRun {
                    exit: StageExit::Aborted,
                    transcript,
                };
            }
        };

        let (response, cached) = match result {
            Ok(pair) => pair,
            Err(e) => {
                return CoderRun {
                    exit: StageExit::Failed {
                        kind: FailureKind::CoderToolError,
                        message: format!("model call failed: {e}"),
                    },
                    transcript,
                };
            }
        };

        sink.emit(
            candidate_id,
            EventKind::LlmCall {
                tokens_in: response.usage.tokens_in,
                tokens_out: response.usage.tokens_out,
                cached,
            },
        )
        .await;

        if let Some(text) = &response.text {
            transcript.push_str(&format!("[turn {turn}] assistant: {text}\n"));
            messages.push(ChatMessage::assistant(text.clone()));
        }

        if response.is_done() {
            debug!(candidate = %candidate_id, turn, "coder finished");
            return CoderRun {
                exit: StageExit::Completed,
                transcript,
            };
        }

        for call in &response.tool_calls {
            if shutdown.is_cancelled() {
                return CoderRun {
                    exit: StageExit::Aborted,
                    transcript,
                };
            }

            match tools.dispatch(call).await {
                Ok(outcome) => {
                    transcript.push_str(&format!("[turn {turn}] {}\n", outcome.summary));
                    sink.emit(
                        candidate_id,
                        EventKind::ToolInvoked {
                            name: call.name.clone(),
                            summary: outcome.summary,
                        },
                    )
                    .await;
                    messages.push(ChatMessage::tool(&call.name, outcome.content));
                }
                Err(e) if e.is_recoverable() => {
                    // Reported to the model in-conversation; no audit event,
                    // and the candidate lives on.
                    info!(candidate = %candidate_id, tool = %call.name, error = %e, "recoverable tool error");
                    transcript.push_str(&format!(
                        "[turn {turn}] tool {} rejected: {e}\n",
                        call.name
                    ));
                    messages.push(ChatMessage::tool(&call.name, format!("tool error: {e}")));
                }
                Err(e) => {
                    return CoderRun {
                        exit: StageExit::Failed {
                            kind: FailureKind::CoderToolError,
                            message: format!("tool {} failed: {e}", call.name),
                        },
                        transcript,
                    };
                }
            }
        }
    }

    CoderRun {
        exit: StageExit::Failed {
            kind: FailureKind::CoderTurnBudget,
            message: format!("no solution after {turn_budget} turns"),
        },
        transcript,
    }
}

/// One line per finished candidate, oldest first, for the coder seed.
pub fn outcome_digest(snapshot: &aurelia_storage::RuntimeSnapshot) -> String {
    let mut lines = Vec::new();
    for candidate in snapshot.candidates.values() {
        if !candidate.is_terminal() {
            continue;
        }
        let line = match (&candidate.metrics, &candidate.error) {
            (Some(metrics), _) => {
                let rendered: Vec<String> = metrics
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                format!("candidate {}: succeeded {}", candidate.id, rendered.join(" "))
            }
            (None, Some(error)) => {
                format!("candidate {}: failed ({})", candidate.id, error.kind)
            }
            (None, None) => format!("candidate {}: aborted", candidate.id),
        };
        lines.push(line);
    }

    if lines.is_empty() {
        "none yet".to_string()
    } else {
        lines.join("\n")
    }
}

/// Evaluation context for the coder seed: the command line plus, when a
/// token of the command names a readable file in the project, that
/// script's text.
pub fn evaluator_context(project_root: &std::path::Path, command: &str) -> String {
    let mut context = format!("Evaluation command: `{command}`");
    for token in command.split_whitespace() {
        let path = project_root.join(token);
        if path.is_file() {
            if let Ok(text) = std::fs::read_to_string(&path) {
                context.push_str(&format!("\n\nContents of `{token}`:\n\n{text}"));
                break;
            }
        }
    }
    context
}

#[cfg(test)]
#[path = "coder_tests.rs"]
mod tests;
