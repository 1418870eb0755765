// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Injected capabilities for the Aurelia engine
//!
//! Each adapter is defined by its operation set (a trait) with real
//! implementations here and fakes behind the `test-support` feature.
//! The engine holds adapters by value; nothing in this crate is global.

pub mod env;
pub mod git;
pub mod llm;
pub mod sandbox;
pub mod subprocess;
pub mod tools;

pub use env::forwarded_env;
pub use git::{GitError, GitWorktrees, Worktree, WorktreeManager};
pub use llm::{
    ChatMessage, ChatResponse, GeminiClient, LlmClient, LlmError, MockLlm, MockReply,
    ResponseCache, Role, TokenUsage, ToolCall, ToolDef,
};
pub use sandbox::{ContainerSandbox, ProcessSandbox, Sandbox, SandboxError, SandboxRun};
pub use tools::{ToolError, ToolOutcome, ToolServer};

#[cfg(any(test, feature = "test-support"))]
pub use git::FakeWorktrees;
#[cfg(any(test, feature = "test-support"))]
pub use sandbox::{FakeSandbox, SandboxCall};
