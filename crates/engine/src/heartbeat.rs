// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat scheduler: the ticking supervisor
//!
//! One task owns the event log and the state store. Candidate tasks only
//! talk back through the event sink; every record is appended (fsynced)
//! and folded here, so the projection is mutated from a single logical
//! task without locks.
//!
//! Tick order: drain checks (shutdown, termination condition, abandon
//! threshold), then candidate creation up to the concurrency limit. The
//! scheduler sleeps for the heartbeat interval or until a candidate event
//! or shutdown wakes it.

use crate::candidate::{run_candidate, CandidateContext};
use crate::coder;
use crate::error::EngineError;
use crate::layout::ProjectLayout;
use crate::sink::{EmittedEvent, EventSink};
use crate::stage_log::StageLogger;
use aurelia_adapters::{forwarded_env, LlmClient, ResponseCache, Sandbox, WorktreeManager};
use aurelia_core::{
    CandidateId, CandidateIds, Clock, EventKind, SystemClock, WorkflowConfig,
};
use aurelia_storage::{read_events, EventLog, StateStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Consecutive failed sandbox probes that are fatal.
const SANDBOX_PROBE_LIMIT: u32 = 3;

/// Capacity of the candidate → scheduler event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why the engine drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A succeeded candidate satisfied the termination condition.
    ConditionMet,
    /// Consecutive failures reached the abandon threshold.
    Abandoned,
    /// An operator signal (or stop request) asked for shutdown.
    ShutdownSignal,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ConditionMet => f.write_str("termination condition met"),
            StopReason::Abandoned => f.write_str("abandoned after repeated failures"),
            StopReason::ShutdownSignal => f.write_str("shutdown requested"),
        }
    }
}

/// Injected capabilities. Tests supply fakes; `start` wires the real ones.
pub struct EngineDeps<W, S, L> {
    pub worktrees: W,
    pub sandbox: S,
    pub llm: L,
}

/// The heartbeat engine. One per `start` invocation.
pub struct Engine<W, S, L> {
    config: Arc<WorkflowConfig>,
    layout: ProjectLayout,
    deps: EngineDeps<W, S, L>,
    shutdown: CancellationToken,
}

impl<W, S, L> Engine<W, S, L>
where
    W: WorktreeManager,
    S: Sandbox,
    L: LlmClient,
{
    pub fn new(config: WorkflowConfig, layout: ProjectLayout, deps: EngineDeps<W, S, L>) -> Self {
        Self {
            config: Arc::new(config),
            layout,
            deps,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that requests graceful drain when cancelled. Handed to the
    /// signal handler and to tests.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the heartbeat loop until drain completes.
    pub async fn run(self) -> Result<StopReason, EngineError> {
        let clock = SystemClock;
        let config = Arc::clone(&self.config);

        // Recover: replay the surviving log into a fresh projection.
        let scan = read_events(&self.layout.events_path())?;
        if scan.dropped > 0 {
            warn!(dropped = scan.dropped, "dropped torn event log tail");
        }
        let mut log = EventLog::open(&self.layout.events_path())?;
        let mut state = StateStore::replay(config.termination.clone(), &scan.events);
        let ids = CandidateIds::after_seq(log.last_seq());
        info!(
            replayed = scan.events.len(),
            candidates = state.current().candidates.len(),
            "recovered state from event log"
        );

        if let Err(e) = self.deps.worktrees.cleanup_orphans().await {
            warn!(error = %e, "orphan worktree cleanup failed");
        }

        // Seed material read once; config is immutable for the run.
        let problem_path = self.layout.root().join(&config.problem_statement);
        let problem = Arc::new(std::fs::read_to_string(&problem_path).map_err(|source| {
            EngineError::ProblemStatement {
                path: problem_path.clone(),
                source,
            }
        })?);
        let evaluator_context = Arc::new(coder::evaluator_context(
            self.layout.root(),
            &config.evaluator.command,
        ));
        let env = forwarded_env(&config.sandbox.env_allowlist);
        let logger = StageLogger::new(self.layout.logs_dir());
        let cache = Arc::new(ResponseCache::new());

        let (tx, mut rx) = mpsc::channel::<EmittedEvent>(EVENT_CHANNEL_CAPACITY);
        let sink = EventSink::new(tx);
        let mut tasks: JoinSet<()> = JoinSet::new();

        record(&mut log, &mut state, None, EventKind::RuntimeStarted, &clock)?;

        let mut draining = false;
        let mut stop: Option<StopReason> = None;
        let mut fatal: Option<EngineError> = None;
        let mut probe_failures: u32 = 0;

        loop {
            // ---- tick ----
            if !draining {
                if self.shutdown.is_cancelled() {
                    stop = Some(StopReason::ShutdownSignal);
                } else if state.termination_satisfied() {
                    stop = Some(StopReason::ConditionMet);
                } else if state.current().consecutive_failures
                    >= config.candidate_abandon_threshold
                {
                    stop = Some(StopReason::Abandoned);
                }

                if let Some(reason) = stop {
                    info!(%reason, "initiating drain");
                    self.begin_drain(&mut log, &mut state, &clock).await?;
                    draining = true;
                }
            }

            if !draining && state.current().active_count() < config.max_concurrent_tasks {
                match self.deps.sandbox.probe().await {
                    Ok(()) => {
                        probe_failures = 0;
                        while state.current().active_count() < config.max_concurrent_tasks {
                            let id = ids.next();
                            self.spawn_candidate(
                                id, &mut log, &mut state, &clock, &sink, &mut tasks, &problem,
                                &evaluator_context, &env, &logger, &cache,
                            )?;
                        }
                    }
                    Err(e) => {
                        // Retried once per tick; fatal after repeated ticks.
                        probe_failures += 1;
                        warn!(attempt = probe_failures, error = %e, "sandbox probe failed");
                        if probe_failures >= SANDBOX_PROBE_LIMIT {
                            fatal = Some(EngineError::SandboxUnavailable(e.to_string()));
                            self.begin_drain(&mut log, &mut state, &clock).await?;
                            draining = true;
                        }
                    }
                }
            }

            if draining && state.current().active_count() == 0 {
                break;
            }

            // ---- sleep until wakeup ----
            tokio::select! {
                received = rx.recv() => {
                    if let Some(emitted) = received {
                        record(&mut log, &mut state, emitted.candidate_id, emitted.kind, &clock)?;
                        // Drain whatever else is already queued before re-ticking.
                        while let Ok(more) = rx.try_recv() {
                            record(&mut log, &mut state, more.candidate_id, more.kind, &clock)?;
                        }
                    }
                }
                _ = self.shutdown.cancelled(), if !draining => {}
                _ = tokio::time::sleep(config.heartbeat_interval) => {}
            }
        }

        // All candidates terminal; collect their tasks and any last events.
        while tasks.join_next().await.is_some() {}
        while let Ok(emitted) = rx.try_recv() {
            record(&mut log, &mut state, emitted.candidate_id, emitted.kind, &clock)?;
        }

        record(&mut log, &mut state, None, EventKind::RuntimeStopped, &clock)?;
        write_advisory_snapshot(&self.layout, &state);
        info!("runtime stopped");

        match fatal {
            Some(error) => Err(error),
            None => Ok(stop.unwrap_or(StopReason::ShutdownSignal)),
        }
    }

    /// Stop creating candidates, cancel the ones in flight, and kill
    /// every live sandbox.
    async fn begin_drain(
        &self,
        log: &mut EventLog,
        state: &mut StateStore,
        clock: &SystemClock,
    ) -> Result<(), EngineError> {
        record(log, state, None, EventKind::RuntimeStopping, clock)?;
        self.shutdown.cancel();
        self.deps.sandbox.kill_all().await;
        Ok(())
    }

    /// Create a candidate record and hand it to its own task.
    ///
    /// Parent is the best-so-far candidate when one exists (its branch is
    /// kept by construction), otherwise the project HEAD.
    #[allow(clippy::too_many_arguments)]
    fn spawn_candidate(
        &self,
        id: CandidateId,
        log: &mut EventLog,
        state: &mut StateStore,
        clock: &SystemClock,
        sink: &EventSink,
        tasks: &mut JoinSet<()>,
        problem: &Arc<String>,
        evaluator_context: &Arc<String>,
        env: &[(String, String)],
        logger: &StageLogger,
        cache: &Arc<ResponseCache>,
    ) -> Result<(), EngineError> {
        let snapshot = state.snapshot();
        let parent = snapshot.best_candidate().map(|c| (c.id, c.branch.clone()));
        let (parent_id, parent_ref) = match parent {
            Some((pid, branch)) => (Some(pid), Some(branch)),
            None => (None, None),
        };

        let branch = self.deps.worktrees.branch_name(id);
        let worktree = self.deps.worktrees.worktree_path(id);
        record(
            log,
            state,
            Some(id),
            EventKind::CandidateCreated {
                parent_id,
                branch,
                worktree,
            },
            clock,
        )?;
        info!(candidate = %id, parent = ?parent_id, "created candidate");

        let ctx = CandidateContext {
            id,
            parent_ref,
            config: Arc::clone(&self.config),
            worktrees: self.deps.worktrees.clone(),
            sandbox: self.deps.sandbox.clone(),
            llm: self.deps.llm.clone(),
            cache: Arc::clone(cache),
            problem: Arc::clone(problem),
            evaluator_context: Arc::clone(evaluator_context),
            history: coder::outcome_digest(&snapshot),
            env: env.to_vec(),
            logger: logger.clone(),
            sink: sink.clone(),
            shutdown: self.shutdown.clone(),
        };
        tasks.spawn(run_candidate(ctx));
        Ok(())
    }
}

/// Drop a snapshot of the final projection under `state/`.
///
/// Advisory only: readers rebuild from the event log and must treat this
/// file as a hint, so failures here are logged and ignored.
fn write_advisory_snapshot(layout: &ProjectLayout, state: &StateStore) {
    let path = layout.state_dir().join("snapshot.json");
    let result = serde_json::to_vec_pretty(&state.snapshot())
        .map_err(std::io::Error::other)
        .and_then(|bytes| {
            std::fs::create_dir_all(layout.state_dir())?;
            std::fs::write(&path, bytes)
        });
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "cannot write advisory snapshot");
    }
}

/// Append one event durably, then fold it into the projection.
fn record(
    log: &mut EventLog,
    state: &mut StateStore,
    candidate_id: Option<CandidateId>,
    kind: EventKind,
    clock: &impl Clock,
) -> Result<(), EngineError> {
    let event = log.append(candidate_id, kind, clock.now())?;
    state.apply(&event);
    Ok(())
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
