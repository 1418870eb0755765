// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM client abstraction
//!
//! The engine drives a tool-using chat protocol: it sends a message
//! history plus tool declarations and receives either a final message or
//! a batch of tool calls. The Gemini client is the production
//! implementation; [`MockLlm`] plays scripted conversations for `--mock`
//! runs and tests. [`ResponseCache`] short-circuits identical requests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Errors from LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing API key: set {GEMINI_API_KEY_VAR}")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(String),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("mock script exhausted")]
    ScriptExhausted,
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool name for `Role::Tool` results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name: Some(name.into()),
        }
    }
}

/// Declaration of a callable tool (JSON-schema parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Token accounting for one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Model reply: final text, tool calls, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// A final message with no tool calls.
    pub fn done(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            usage: TokenUsage {
                tokens_in: 10,
                tokens_out: 5,
            },
        }
    }

    /// A single tool call.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
            usage: TokenUsage {
                tokens_in: 10,
                tokens_out: 5,
            },
        }
    }

    pub fn is_done(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Request→response over a tool-using chat protocol.
#[async_trait]
pub trait LlmClient: Clone + Send + Sync + 'static {
    fn model_id(&self) -> &str;

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<ChatResponse, LlmError>;
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Build a client reading the API key from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var(GEMINI_API_KEY_VAR).map_err(|_| LlmError::MissingApiKey)?;
        Ok(Self::new(model, api_key, Self::DEFAULT_BASE_URL))
    }

    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn request_body(messages: &[ChatMessage], tools: &[ToolDef]) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = messages
            .iter()
            .filter_map(|m| match m.role {
                Role::System => None,
                Role::User => Some(json!({
                    "role": "user",
                    "parts": [{"text": m.content}],
                })),
                Role::Assistant => Some(json!({
                    "role": "model",
                    "parts": [{"text": m.content}],
                })),
                Role::Tool => Some(json!({
                    "role": "user",
                    "parts": [{"functionResponse": {
                        "name": m.tool_name.as_deref().unwrap_or("tool"),
                        "response": {"content": m.content},
                    }}],
                })),
            })
            .collect();

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system.join("\n\n")}]});
        }
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        body
    }

    fn parse_response(value: &Value) -> Result<ChatResponse, LlmError> {
        let parts = value
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Decode("no candidates in response".to_string()))?;

        let mut text_parts: Vec<&str> = Vec::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                text_parts.push(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LlmError::Decode("functionCall without name".to_string()))?;
                let arguments = call.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_calls.push(ToolCall {
                    name: name.to_string(),
                    arguments,
                });
            }
        }

        let usage = TokenUsage {
            tokens_in: value
                .pointer("/usageMetadata/promptTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            tokens_out: value
                .pointer("/usageMetadata/candidatesTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        };

        Ok(ChatResponse {
            text: if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join(""))
            },
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<ChatResponse, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = Self::request_body(messages, tools);

        let response = self
            .http
            .post(&url)
            .timeout(Self::REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            let message = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Self::parse_response(&value)
    }
}

/// One scripted step of a [`MockLlm`] conversation.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(ChatResponse),
    /// Never resolves. For exercising cancellation mid-call.
    Stall,
}

/// Scripted LLM client for `--mock` runs and tests.
///
/// Replies are popped in order; when the script is empty the fallback
/// response (if any) repeats, otherwise calls fail with
/// [`LlmError::ScriptExhausted`].
#[derive(Clone)]
pub struct MockLlm {
    model: String,
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    script: VecDeque<MockReply>,
    fallback: Option<ChatResponse>,
    requests: Vec<Vec<ChatMessage>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            model: "mock".to_string(),
            inner: Arc::new(Mutex::new(MockState {
                script: VecDeque::new(),
                fallback: None,
                requests: Vec::new(),
            })),
        }
    }

    /// Queue a response.
    pub fn push(&self, response: ChatResponse) {
        self.inner
            .lock()
            .script
            .push_back(MockReply::Respond(response));
    }

    /// Queue a call that never resolves.
    pub fn push_stall(&self) {
        self.inner.lock().script.push_back(MockReply::Stall);
    }

    /// Response repeated once the script is exhausted.
    pub fn set_fallback(&self, response: ChatResponse) {
        self.inner.lock().fallback = Some(response);
    }

    /// All message histories this client was called with.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.inner.lock().requests.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDef],
    ) -> Result<ChatResponse, LlmError> {
        let reply = {
            let mut inner = self.inner.lock();
            inner.requests.push(messages.to_vec());
            match inner.script.pop_front() {
                Some(reply) => reply,
                None => match &inner.fallback {
                    Some(response) => MockReply::Respond(response.clone()),
                    None => return Err(LlmError::ScriptExhausted),
                },
            }
        };

        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::Stall => loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            },
        }
    }
}

/// Response cache keyed by `(model, messages, tools)`.
///
/// Hits are reported so the caller can record `llm_call(cached=true)`.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, ChatResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Chat through the cache. Returns the response and whether it was a
    /// cache hit.
    pub async fn chat<L: LlmClient>(
        &self,
        llm: &L,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<(ChatResponse, bool), LlmError> {
        let key = Self::key(llm.model_id(), messages, tools)?;

        if let Some(hit) = self.entries.lock().get(&key).cloned() {
            debug!(model = llm.model_id(), "LLM response cache hit");
            return Ok((hit, true));
        }

        let response = llm.chat(messages, tools).await?;
        self.entries.lock().insert(key, response.clone());
        Ok((response, false))
    }

    fn key(model: &str, messages: &[ChatMessage], tools: &[ToolDef]) -> Result<String, LlmError> {
        let serialized = serde_json::to_vec(&(model, messages, tools))
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let digest = Sha256::digest(&serialized);
        Ok(format!("{:x}", digest))
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
