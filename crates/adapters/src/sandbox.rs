// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandboxed command execution
//!
//! A sandbox runs one command against a worktree with a scrubbed
//! environment and a wall-clock timeout. The container implementation is
//! the production path; the process implementation backs `--mock` runs
//! and tests where no container runtime is available.

use crate::subprocess::{run_with_timeout, CONTAINER_CONTROL_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
    #[error("failed to launch sandboxed command: {0}")]
    Spawn(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured result of one sandboxed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRun {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl SandboxRun {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    pub fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Last `limit` characters of stderr, for failure messages.
    pub fn stderr_tail(&self, limit: usize) -> String {
        let trimmed = self.stderr.trim_end();
        match trimmed.char_indices().nth_back(limit.saturating_sub(1)) {
            Some((pos, _)) if pos > 0 => format!("…{}", &trimmed[pos..]),
            _ => trimmed.to_string(),
        }
    }
}

/// Run commands against a worktree inside an execution boundary.
#[async_trait]
pub trait Sandbox: Clone + Send + Sync + 'static {
    /// Health check. The scheduler retries failed probes across ticks and
    /// drains after repeated failures.
    async fn probe(&self) -> Result<(), SandboxError>;

    /// Run `command` with the worktree mounted read-write, forwarding only
    /// the given environment, killed after `timeout`.
    async fn run(
        &self,
        command: &str,
        worktree: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<SandboxRun, SandboxError>;

    /// Kill every live execution. Called once on engine shutdown.
    async fn kill_all(&self);
}

/// Container sandbox driven through the `docker` CLI.
///
/// Each run is a fresh container with the worktree bind-mounted at
/// `/workspace`. Timeouts are enforced with `docker kill`; live container
/// names are tracked so shutdown can terminate all of them.
#[derive(Clone)]
pub struct ContainerSandbox {
    image: String,
    live: Arc<Mutex<HashSet<String>>>,
    counter: Arc<AtomicU64>,
}

impl ContainerSandbox {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            live: Arc::new(Mutex::new(HashSet::new())),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("aurelia-{}-{}", std::process::id(), n)
    }

    async fn docker_kill(name: &str) {
        let mut cmd = Command::new("docker");
        cmd.args(["kill", name]);
        if let Err(e) = run_with_timeout(cmd, CONTAINER_CONTROL_TIMEOUT, "docker kill").await {
            warn!(container = name, error = %e, "failed to kill container");
        }
    }
}

#[async_trait]
impl Sandbox for ContainerSandbox {
    async fn probe(&self) -> Result<(), SandboxError> {
        let mut cmd = Command::new("docker");
        cmd.args(["info", "--format", "{{.ServerVersion}}"])
            .stdout(Stdio::null());
        let output = run_with_timeout(cmd, CONTAINER_CONTROL_TIMEOUT, "docker info")
            .await
            .map_err(SandboxError::Unavailable)?;
        if !output.status.success() {
            return Err(SandboxError::Unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        worktree: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<SandboxRun, SandboxError> {
        let name = self.next_name();

        let mut cmd = Command::new("docker");
        cmd.args(["run", "--rm", "--name", &name])
            .arg("-v")
            .arg(format!("{}:/workspace", worktree.display()))
            .args(["-w", "/workspace"]);
        for (key, value) in env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(&self.image).args(["sh", "-lc", command]);
        cmd.kill_on_drop(true);

        self.live.lock().insert(name.clone());
        debug!(container = %name, command, "starting sandboxed command");

        let output = cmd.output();
        tokio::pin!(output);

        let (result, timed_out) = tokio::select! {
            result = &mut output => (result, false),
            _ = tokio::time::sleep(timeout) => {
                Self::docker_kill(&name).await;
                // `docker run` exits once the container is killed.
                (output.await, true)
            }
        };
        self.live.lock().remove(&name);

        let output = result.map_err(|e| SandboxError::Spawn(e.to_string()))?;
        Ok(SandboxRun {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out,
        })
    }

    async fn kill_all(&self) {
        let names: Vec<String> = self.live.lock().iter().cloned().collect();
        for name in names {
            warn!(container = %name, "killing live sandbox on shutdown");
            Self::docker_kill(&name).await;
        }
    }
}

/// Plain subprocess sandbox: same contract, no container boundary.
///
/// Commands run with the worktree as working directory and a scrubbed
/// environment (only `PATH`, `HOME`, and the allowlisted variables).
/// Used by `--mock` runs and tests.
#[derive(Clone, Default)]
pub struct ProcessSandbox;

impl ProcessSandbox {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn probe(&self) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        worktree: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<SandboxRun, SandboxError> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]).current_dir(worktree);
        cmd.env_clear();
        for name in ["PATH", "HOME"] {
            if let Ok(value) = std::env::var(name) {
                cmd.env(name, value);
            }
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
        // Timeout drops the in-flight future, killing the child.
        cmd.kill_on_drop(true);

        let output = cmd.output();
        tokio::pin!(output);

        tokio::select! {
            result = &mut output => {
                let output = result.map_err(|e| SandboxError::Spawn(e.to_string()))?;
                Ok(SandboxRun {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    timed_out: false,
                })
            }
            _ = tokio::time::sleep(timeout) => Ok(SandboxRun::timeout()),
        }
    }

    async fn kill_all(&self) {
        // Children die with their run futures (kill_on_drop).
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;

    /// Recorded call to [`FakeSandbox::run`].
    #[derive(Debug, Clone)]
    pub struct SandboxCall {
        pub command: String,
        pub worktree: PathBuf,
        pub env: Vec<(String, String)>,
    }

    /// Scripted sandbox for deterministic tests.
    ///
    /// Responses are matched by command substring, first matching pattern
    /// wins; unmatched commands get the default response (exit 0).
    /// Multiple responses for one pattern play in order, with the last
    /// one repeating.
    #[derive(Clone)]
    pub struct FakeSandbox {
        inner: Arc<Mutex<FakeState>>,
    }

    struct FakeState {
        responses: Vec<(String, std::collections::VecDeque<SandboxRun>)>,
        default: SandboxRun,
        calls: Vec<SandboxCall>,
        probe_failures: u32,
        kill_count: u32,
    }

    impl Default for FakeSandbox {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeSandbox {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    responses: Vec::new(),
                    default: SandboxRun::ok(""),
                    calls: Vec::new(),
                    probe_failures: 0,
                    kill_count: 0,
                })),
            }
        }

        /// Script a response for commands containing `pattern`. Calling
        /// again with the same pattern queues a follow-up response.
        pub fn respond(&self, pattern: impl Into<String>, run: SandboxRun) {
            let pattern = pattern.into();
            let mut inner = self.inner.lock();
            if let Some((_, queue)) = inner.responses.iter_mut().find(|(p, _)| *p == pattern) {
                queue.push_back(run);
            } else {
                inner.responses.push((pattern, [run].into()));
            }
        }

        /// Response for commands no pattern matches.
        pub fn set_default(&self, run: SandboxRun) {
            self.inner.lock().default = run;
        }

        /// Fail the next `n` probes with `Unavailable`.
        pub fn fail_probes(&self, n: u32) {
            self.inner.lock().probe_failures = n;
        }

        pub fn calls(&self) -> Vec<SandboxCall> {
            self.inner.lock().calls.clone()
        }

        pub fn kill_count(&self) -> u32 {
            self.inner.lock().kill_count
        }
    }

    #[async_trait]
    impl Sandbox for FakeSandbox {
        async fn probe(&self) -> Result<(), SandboxError> {
            let mut inner = self.inner.lock();
            if inner.probe_failures > 0 {
                inner.probe_failures -= 1;
                return Err(SandboxError::Unavailable("scripted probe failure".into()));
            }
            Ok(())
        }

        async fn run(
            &self,
            command: &str,
            worktree: &Path,
            env: &[(String, String)],
            _timeout: Duration,
        ) -> Result<SandboxRun, SandboxError> {
            let mut inner = self.inner.lock();
            inner.calls.push(SandboxCall {
                command: command.to_string(),
                worktree: worktree.to_owned(),
                env: env.to_vec(),
            });
            let run = match inner
                .responses
                .iter_mut()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
            {
                Some((_, queue)) if queue.len() > 1 => queue.pop_front(),
                Some((_, queue)) => queue.front().cloned(),
                None => None,
            }
            .unwrap_or_else(|| inner.default.clone());
            Ok(run)
        }

        async fn kill_all(&self) {
            self.inner.lock().kill_count += 1;
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSandbox, SandboxCall};

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
