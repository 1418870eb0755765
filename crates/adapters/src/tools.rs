// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool server: file and command capabilities scoped to one worktree
//!
//! The coder drives these three tools. Paths are relative to the worktree
//! root and lexically normalized; anything that would leave the root is
//! rejected before touching the filesystem. Summaries carry sizes and
//! argv heads, never raw payloads, so the audit trail stays small.

use crate::llm::{ToolCall, ToolDef};
use crate::sandbox::{Sandbox, SandboxError};
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Truncation bound for command output fed back to the model.
const MAX_TOOL_OUTPUT: usize = 8 * 1024;

/// Errors from tool invocations
#[derive(Debug, Error)]
pub enum ToolError {
    /// The normalized path leaves the worktree. Reported back to the
    /// model as a tool error; never fails the candidate by itself.
    #[error("path escapes the worktree: {0}")]
    PathEscape(String),
    #[error("invalid tool arguments: {0}")]
    InvalidArgs(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

impl ToolError {
    /// Errors the model can recover from within the conversation:
    /// rejected paths, malformed arguments, and reads of files that do
    /// not exist. Everything else fails the candidate.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ToolError::PathEscape(_) | ToolError::InvalidArgs(_) => true,
            ToolError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result of one tool invocation: content for the model, summary for the
/// audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    pub summary: String,
}

/// File and command capabilities scoped to one candidate's worktree.
pub struct ToolServer<S: Sandbox> {
    root: PathBuf,
    sandbox: S,
    env: Vec<(String, String)>,
    command_timeout: Duration,
}

impl<S: Sandbox> ToolServer<S> {
    pub fn new(
        root: PathBuf,
        sandbox: S,
        env: Vec<(String, String)>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            root,
            sandbox,
            env,
            command_timeout,
        }
    }

    /// Tool declarations advertised to the model.
    pub fn tool_defs() -> Vec<ToolDef> {
        vec![
            ToolDef {
                name: "read_file".to_string(),
                description: "Read a file from the working copy".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path relative to the working copy root",
                        },
                    },
                    "required": ["path"],
                }),
            },
            ToolDef {
                name: "write_file".to_string(),
                description: "Create or replace a file in the working copy".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path relative to the working copy root",
                        },
                        "contents": {
                            "type": "string",
                            "description": "Full new contents of the file",
                        },
                    },
                    "required": ["path", "contents"],
                }),
            },
            ToolDef {
                name: "run_command".to_string(),
                description: "Run a command in the working copy sandbox".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "argv": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Command and arguments",
                        },
                    },
                    "required": ["argv"],
                }),
            },
        ]
    }

    /// Route a model-requested call to the matching capability.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutcome, ToolError> {
        match call.name.as_str() {
            "read_file" => {
                let path = required_str(&call.arguments, "path")?;
                self.read_file(path).await
            }
            "write_file" => {
                let path = required_str(&call.arguments, "path")?;
                let contents = required_str(&call.arguments, "contents")?;
                self.write_file(path, contents).await
            }
            "run_command" => {
                let argv = required_argv(&call.arguments)?;
                self.run_command(&argv).await
            }
            other => Err(ToolError::InvalidArgs(format!("unknown tool: {other}"))),
        }
    }

    pub async fn read_file(&self, rel: &str) -> Result<ToolOutcome, ToolError> {
        let path = self.resolve(rel)?;
        let bytes = tokio::fs::read(&path).await?;
        let summary = format!("read_file {} ({} bytes)", rel, bytes.len());
        Ok(ToolOutcome {
            content: String::from_utf8_lossy(&bytes).to_string(),
            summary,
        })
    }

    pub async fn write_file(&self, rel: &str, contents: &str) -> Result<ToolOutcome, ToolError> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Atomic replace: write a sibling temp file, then rename over.
        let tmp = temp_sibling(&path);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let summary = format!("write_file {} ({} bytes)", rel, contents.len());
        Ok(ToolOutcome {
            content: "ok".to_string(),
            summary,
        })
    }

    pub async fn run_command(&self, argv: &[String]) -> Result<ToolOutcome, ToolError> {
        if argv.is_empty() {
            return Err(ToolError::InvalidArgs("empty argv".to_string()));
        }
        let command = argv
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ");

        let run = self
            .sandbox
            .run(&command, &self.root, &self.env, self.command_timeout)
            .await?;

        let status = if run.timed_out {
            "timed out".to_string()
        } else {
            format!("exit {}", run.exit_code)
        };
        let content = format!(
            "{}\nstdout:\n{}\nstderr:\n{}",
            status,
            truncate(&run.stdout, MAX_TOOL_OUTPUT),
            truncate(&run.stderr, MAX_TOOL_OUTPUT),
        );
        let summary = format!("run_command `{}` ({})", argv_head(argv), status);
        Ok(ToolOutcome { content, summary })
    }

    /// Lexically resolve a relative path inside the worktree.
    ///
    /// Rejects absolute paths and any `..` walking above the root. No
    /// filesystem access, so a rejected path leaves no trace.
    fn resolve(&self, rel: &str) -> Result<PathBuf, ToolError> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() {
            return Err(ToolError::PathEscape(rel.to_string()));
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in rel_path.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(ToolError::PathEscape(rel.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::PathEscape(rel.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing string argument {key:?}")))
}

fn required_argv(arguments: &Value) -> Result<Vec<String>, ToolError> {
    let items = arguments
        .get("argv")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::InvalidArgs("missing array argument \"argv\"".to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArgs("argv items must be strings".to_string()))
        })
        .collect()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{file_name}.aurelia-tmp"))
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… [truncated {} bytes]", &text[..end], text.len() - end)
}

fn argv_head(argv: &[String]) -> String {
    const HEAD: usize = 3;
    let mut head = argv.iter().take(HEAD).cloned().collect::<Vec<_>>().join(" ");
    if argv.len() > HEAD {
        head.push_str(" …");
    }
    head
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
