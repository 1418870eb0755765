// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_core::CandidateId;
use std::process::Command as StdCommand;

fn run_git(repo: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args([
            "-c",
            "user.name=aurelia-test",
            "-c",
            "user.email=aurelia@test.invalid",
        ])
        .args(args)
        .current_dir(repo)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Temp git repository with one commit.
fn fixture_repo() -> (tempfile::TempDir, GitWorktrees) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_owned();
    run_git(&root, &["init", "-q", "-b", "main"]);
    std::fs::write(root.join("README.md"), "fixture\n").unwrap();
    run_git(&root, &["add", "."]);
    run_git(&root, &["commit", "-q", "-m", "init"]);

    let manager = GitWorktrees::new(root.clone(), root.join(".aurelia/worktrees"));
    (dir, manager)
}

#[test]
fn branch_and_path_names_are_deterministic() {
    let manager = GitWorktrees::new(PathBuf::from("/repo"), PathBuf::from("/repo/.aurelia/worktrees"));

    assert_eq!(manager.branch_name(CandidateId(7)), "aurelia/candidate-7");
    assert_eq!(
        manager.worktree_path(CandidateId(7)),
        PathBuf::from("/repo/.aurelia/worktrees/7")
    );
}

#[tokio::test]
async fn create_makes_checkout_on_candidate_branch() {
    let (_dir, manager) = fixture_repo();

    let head = manager.head_ref().await.unwrap();
    let worktree = manager.create(CandidateId(1), &head).await.unwrap();

    assert!(worktree.path.join("README.md").exists());
    assert_eq!(worktree.branch, "aurelia/candidate-1");
}

#[tokio::test]
async fn child_worktree_descends_from_parent_branch() {
    let (_dir, manager) = fixture_repo();
    let head = manager.head_ref().await.unwrap();

    let parent = manager.create(CandidateId(1), &head).await.unwrap();
    std::fs::write(parent.path.join("solution.txt"), "v1\n").unwrap();
    run_git(&parent.path, &["add", "."]);
    run_git(&parent.path, &["commit", "-q", "-m", "candidate 1"]);
    manager.destroy(&parent, true).await.unwrap();

    let child = manager
        .create(CandidateId(2), "aurelia/candidate-1")
        .await
        .unwrap();

    assert!(child.path.join("solution.txt").exists());
}

#[tokio::test]
async fn destroy_removes_path_and_optionally_branch() {
    let (dir, manager) = fixture_repo();
    let head = manager.head_ref().await.unwrap();

    let kept = manager.create(CandidateId(1), &head).await.unwrap();
    manager.destroy(&kept, true).await.unwrap();
    assert!(!kept.path.exists());

    let dropped = manager.create(CandidateId(2), &head).await.unwrap();
    manager.destroy(&dropped, false).await.unwrap();
    assert!(!dropped.path.exists());

    let output = StdCommand::new("git")
        .args(["branch", "--list", "aurelia/candidate-*"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let branches = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(branches.contains("aurelia/candidate-1"));
    assert!(!branches.contains("aurelia/candidate-2"));
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let (_dir, manager) = fixture_repo();
    let head = manager.head_ref().await.unwrap();

    let worktree = manager.create(CandidateId(1), &head).await.unwrap();
    manager.destroy(&worktree, false).await.unwrap();
    manager.destroy(&worktree, false).await.unwrap();
}

#[tokio::test]
async fn create_recovers_from_leftover_directory() {
    let (_dir, manager) = fixture_repo();
    let head = manager.head_ref().await.unwrap();

    // Simulate an interrupted previous attempt
    std::fs::create_dir_all(manager.worktree_path(CandidateId(1))).unwrap();

    let worktree = manager.create(CandidateId(1), &head).await.unwrap();
    assert!(worktree.path.join("README.md").exists());
}

#[tokio::test]
async fn cleanup_orphans_clears_worktrees_dir() {
    let (_dir, manager) = fixture_repo();
    let head = manager.head_ref().await.unwrap();

    let orphan = manager.create(CandidateId(1), &head).await.unwrap();
    assert!(orphan.path.exists());

    manager.cleanup_orphans().await.unwrap();
    assert!(!orphan.path.exists());

    // Repository still works after cleanup
    let fresh = manager.create(CandidateId(2), &head).await.unwrap();
    assert!(fresh.path.join("README.md").exists());
}

// ── FakeWorktrees ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fake_records_parent_refs() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorktrees::new(dir.path().to_owned());

    fake.create(CandidateId(1), "HEAD").await.unwrap();
    fake.create(CandidateId(2), "aurelia/candidate-1")
        .await
        .unwrap();

    assert_eq!(
        fake.created(),
        vec![
            (CandidateId(1), "HEAD".to_string()),
            (CandidateId(2), "aurelia/candidate-1".to_string()),
        ]
    );
}

#[tokio::test]
async fn fake_creates_and_destroys_directories() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorktrees::new(dir.path().to_owned());

    let worktree = fake.create(CandidateId(3), "HEAD").await.unwrap();
    assert!(worktree.path.is_dir());

    fake.destroy(&worktree, false).await.unwrap();
    assert!(!worktree.path.exists());
    assert_eq!(fake.destroyed(), vec![(CandidateId(3), false)]);
}

#[tokio::test]
async fn fake_fail_next_create() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeWorktrees::new(dir.path().to_owned());
    fake.fail_next_create("disk full");

    let err = fake.create(CandidateId(1), "HEAD").await.unwrap_err();
    assert!(err.to_string().contains("disk full"));

    // Only the next create fails
    fake.create(CandidateId(2), "HEAD").await.unwrap();
}
