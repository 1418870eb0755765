// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree lifecycle management
//!
//! Each candidate gets an isolated checkout: a branch
//! `aurelia/candidate-<id>` forked from its parent ref, mounted as a git
//! worktree under `.aurelia/worktrees/<id>`. Branch and path names are
//! deterministic so the scheduler can record them before the checkout
//! exists.

use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use async_trait::async_trait;
use aurelia_core::CandidateId;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from git worktree operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {op} failed: {detail}")]
    Op { op: &'static str, detail: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An isolated checkout owned by one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub candidate_id: CandidateId,
    pub branch: String,
    pub path: PathBuf,
}

/// Create and destroy isolated worktrees on candidate branches.
#[async_trait]
pub trait WorktreeManager: Clone + Send + Sync + 'static {
    /// Branch name a candidate's checkout will use.
    fn branch_name(&self, id: CandidateId) -> String;

    /// Path a candidate's checkout will live at.
    fn worktree_path(&self, id: CandidateId) -> PathBuf;

    /// Resolve the project HEAD, the fork point for first candidates.
    async fn head_ref(&self) -> Result<String, GitError>;

    /// Fork a branch from `parent_ref` and mount it as a worktree.
    async fn create(&self, id: CandidateId, parent_ref: &str) -> Result<Worktree, GitError>;

    /// Remove the checkout. The branch survives only when `keep_branch`
    /// (success outcomes keep it so children can fork from it).
    async fn destroy(&self, worktree: &Worktree, keep_branch: bool) -> Result<(), GitError>;

    /// Clean up checkouts left behind by an interrupted process.
    async fn cleanup_orphans(&self) -> Result<(), GitError>;
}

/// Real worktree manager shelling out to `git`.
#[derive(Clone)]
pub struct GitWorktrees {
    repo_root: PathBuf,
    worktrees_dir: PathBuf,
}

impl GitWorktrees {
    pub fn new(repo_root: PathBuf, worktrees_dir: PathBuf) -> Self {
        Self {
            repo_root,
            worktrees_dir,
        }
    }

    async fn git(&self, op: &'static str, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.repo_root);

        let output = run_with_timeout(cmd, GIT_TIMEOUT, op)
            .await
            .map_err(|detail| GitError::Op { op, detail })?;

        if !output.status.success() {
            return Err(GitError::Op {
                op,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Best-effort git call where failure is expected in some states
    /// (e.g. deleting a branch that was never created).
    async fn git_quiet(&self, op: &'static str, args: &[&str]) {
        if let Err(e) = self.git(op, args).await {
            debug!(error = %e, "ignoring git cleanup failure");
        }
    }
}

#[async_trait]
impl WorktreeManager for GitWorktrees {
    fn branch_name(&self, id: CandidateId) -> String {
        format!("aurelia/candidate-{id}")
    }

    fn worktree_path(&self, id: CandidateId) -> PathBuf {
        self.worktrees_dir.join(id.to_string())
    }

    async fn head_ref(&self) -> Result<String, GitError> {
        self.git("rev-parse", &["rev-parse", "HEAD"]).await
    }

    async fn create(&self, id: CandidateId, parent_ref: &str) -> Result<Worktree, GitError> {
        let branch = self.branch_name(id);
        let path = self.worktree_path(id);

        std::fs::create_dir_all(&self.worktrees_dir)?;

        // Idempotency: a leftover checkout from an interrupted attempt is
        // cleared before re-adding, and the branch is force-reset.
        if path.exists() {
            warn!(path = %path.display(), "removing leftover worktree before create");
            std::fs::remove_dir_all(&path)?;
            self.git_quiet("worktree-prune", &["worktree", "prune"]).await;
        }

        self.git(
            "branch",
            &["branch", "--force", &branch, parent_ref],
        )
        .await?;

        let path_str = path.to_string_lossy().to_string();
        self.git("worktree-add", &["worktree", "add", &path_str, &branch])
            .await?;

        debug!(candidate = %id, branch, path = %path.display(), "created worktree");
        Ok(Worktree {
            candidate_id: id,
            branch,
            path,
        })
    }

    async fn destroy(&self, worktree: &Worktree, keep_branch: bool) -> Result<(), GitError> {
        if worktree.path.exists() {
            let path_str = worktree.path.to_string_lossy().to_string();
            if self
                .git(
                    "worktree-remove",
                    &["worktree", "remove", "--force", &path_str],
                )
                .await
                .is_err()
            {
                // Fall back to removing the directory and pruning metadata.
                std::fs::remove_dir_all(&worktree.path)?;
                self.git_quiet("worktree-prune", &["worktree", "prune"]).await;
            }
        } else {
            self.git_quiet("worktree-prune", &["worktree", "prune"]).await;
        }

        if !keep_branch {
            self.git_quiet("branch-delete", &["branch", "-D", &worktree.branch])
                .await;
        }

        debug!(
            candidate = %worktree.candidate_id,
            keep_branch,
            "destroyed worktree"
        );
        Ok(())
    }

    async fn cleanup_orphans(&self) -> Result<(), GitError> {
        // Runs at startup, before any candidate exists: everything under
        // the worktrees dir is an orphan of a previous process.
        if self.worktrees_dir.exists() {
            for entry in std::fs::read_dir(&self.worktrees_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    warn!(path = %path.display(), "removing orphaned worktree");
                    std::fs::remove_dir_all(&path)?;
                }
            }
        }
        self.git_quiet("worktree-prune", &["worktree", "prune"]).await;
        Ok(())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake worktree manager backed by plain directories.
    ///
    /// Records every call so tests can assert on parent refs and branch
    /// retention without a real git repository.
    #[derive(Clone)]
    pub struct FakeWorktrees {
        base: PathBuf,
        inner: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        created: Vec<(CandidateId, String)>,
        destroyed: Vec<(CandidateId, bool)>,
        fail_create: Option<String>,
    }

    impl FakeWorktrees {
        pub fn new(base: PathBuf) -> Self {
            Self {
                base,
                inner: Arc::new(Mutex::new(FakeState::default())),
            }
        }

        /// `(candidate, parent_ref)` pairs in creation order.
        pub fn created(&self) -> Vec<(CandidateId, String)> {
            self.inner.lock().created.clone()
        }

        /// `(candidate, keep_branch)` pairs in destruction order.
        pub fn destroyed(&self) -> Vec<(CandidateId, bool)> {
            self.inner.lock().destroyed.clone()
        }

        /// Make the next `create` fail with a git error.
        pub fn fail_next_create(&self, detail: impl Into<String>) {
            self.inner.lock().fail_create = Some(detail.into());
        }
    }

    #[async_trait]
    impl WorktreeManager for FakeWorktrees {
        fn branch_name(&self, id: CandidateId) -> String {
            format!("aurelia/candidate-{id}")
        }

        fn worktree_path(&self, id: CandidateId) -> PathBuf {
            self.base.join(id.to_string())
        }

        async fn head_ref(&self) -> Result<String, GitError> {
            Ok("HEAD".to_string())
        }

        async fn create(&self, id: CandidateId, parent_ref: &str) -> Result<Worktree, GitError> {
            {
                let mut state = self.inner.lock();
                if let Some(detail) = state.fail_create.take() {
                    return Err(GitError::Op {
                        op: "worktree-add",
                        detail,
                    });
                }
                state.created.push((id, parent_ref.to_string()));
            }
            let path = self.worktree_path(id);
            std::fs::create_dir_all(&path)?;
            Ok(Worktree {
                candidate_id: id,
                branch: self.branch_name(id),
                path,
            })
        }

        async fn destroy(&self, worktree: &Worktree, keep_branch: bool) -> Result<(), GitError> {
            self.inner
                .lock()
                .destroyed
                .push((worktree.candidate_id, keep_branch));
            if worktree.path.exists() {
                std::fs::remove_dir_all(&worktree.path)?;
            }
            Ok(())
        }

        async fn cleanup_orphans(&self) -> Result<(), GitError> {
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeWorktrees;

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
