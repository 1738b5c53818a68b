//! Shared types used across council modules
//!
//! Contains message structures, tool call/result shapes, and agent turns.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of an agent (lowercase, e.g. `rick`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Create an id, normalizing to lowercase
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Who produced a message in the conversation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Agent,
    ToolResult,
}

/// A message in the conversation window
///
/// `seq` is assigned by the context manager on append and is strictly
/// increasing for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct Message {
    pub seq: u64,
    pub role: Role,
    /// Originating agent; `None` for user messages
    pub agent: Option<AgentId>,
    pub content: String,
    /// Structured payload for tool-result messages
    pub tool_result: Option<ToolResult>,
    pub timestamp: DateTime<Utc>,
    /// False when the agent's text was cut off and could not be completed
    pub complete: bool,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            seq: 0,
            role: Role::User,
            agent: None,
            content: content.into(),
            tool_result: None,
            timestamp: Utc::now(),
            complete: true,
        }
    }

    /// Create a new agent message
    pub fn agent(agent: AgentId, content: impl Into<String>) -> Self {
        Self {
            seq: 0,
            role: Role::Agent,
            agent: Some(agent),
            content: content.into(),
            tool_result: None,
            timestamp: Utc::now(),
            complete: true,
        }
    }

    /// Create a tool-result message attributed to the agent that requested it
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            seq: 0,
            role: Role::ToolResult,
            agent: Some(result.agent.clone()),
            content: result.payload.render(),
            tool_result: Some(result),
            timestamp: Utc::now(),
            complete: true,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, if any
    #[serde(default)]
    pub id: Option<String>,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as a mapping; non-object arguments yield an empty map
    pub fn argument_map(&self) -> Map<String, Value> {
        match &self.arguments {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Definition of a tool offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Identifies one tool invocation issued within one agent turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId {
    pub turn: u64,
    pub seq: u32,
}

/// A request to execute one tool on behalf of one agent
#[derive(Debug, Clone)]
pub struct ToolInvocationRequest {
    pub id: InvocationId,
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub agent: AgentId,
    /// Hard deadline for the whole invocation, fallback included
    pub deadline: Instant,
}

/// Which path produced a tool result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrigin {
    Remote,
    Local,
    Error,
}

impl fmt::Display for ToolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOrigin::Remote => write!(f, "remote"),
            ToolOrigin::Local => write!(f, "local"),
            ToolOrigin::Error => write!(f, "error"),
        }
    }
}

/// Why a tool invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFailure {
    Timeout,
    Cancelled,
    Unreachable(String),
    Protocol(String),
    CommandFailed { exit_code: i32, stderr: String },
    Template(String),
    UnknownTool(String),
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::Timeout => write!(f, "timeout"),
            ToolFailure::Cancelled => write!(f, "cancelled"),
            ToolFailure::Unreachable(server) => write!(f, "server {server} unreachable"),
            ToolFailure::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ToolFailure::CommandFailed { exit_code, stderr } => {
                write!(f, "command exited with {exit_code}: {}", stderr.trim())
            }
            ToolFailure::Template(msg) => write!(f, "bad command template: {msg}"),
            ToolFailure::UnknownTool(name) => write!(f, "unknown tool: {name}"),
        }
    }
}

/// Normalized tool output
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Structured(Value),
    Text(String),
}

impl ToolPayload {
    /// Human-readable rendering fed back to the model
    pub fn render(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Structured(value) => match value.get("content").and_then(Value::as_array) {
                Some(items) => items
                    .iter()
                    .map(|item| match item.get("type").and_then(Value::as_str) {
                        Some("text") => item
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        Some("resource") => format!(
                            "Resource: {}",
                            item.pointer("/resource/uri")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown")
                        ),
                        _ => item.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            },
        }
    }
}

/// Result of executing a tool
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub invocation: InvocationId,
    pub agent: AgentId,
    pub tool_name: String,
    pub success: bool,
    pub payload: ToolPayload,
    pub origin: ToolOrigin,
    pub failure: Option<ToolFailure>,
    pub latency: Duration,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(
        request: &ToolInvocationRequest,
        origin: ToolOrigin,
        payload: ToolPayload,
        latency: Duration,
    ) -> Self {
        Self {
            invocation: request.id,
            agent: request.agent.clone(),
            tool_name: request.tool.clone(),
            success: true,
            payload,
            origin,
            failure: None,
            latency,
        }
    }

    /// Create a failed result
    pub fn failure(request: &ToolInvocationRequest, failure: ToolFailure, latency: Duration) -> Self {
        Self {
            invocation: request.id,
            agent: request.agent.clone(),
            tool_name: request.tool.clone(),
            success: false,
            payload: ToolPayload::Text(failure.to_string()),
            origin: ToolOrigin::Error,
            failure: Some(failure),
            latency,
        }
    }

    /// One-paragraph summary for prompts, output capped at `limit` chars
    pub fn summarize(&self, limit: usize) -> String {
        let rendered = self.payload.render();
        let output: String = rendered.chars().take(limit).collect();
        if self.success {
            format!("Tool '{}' ({}) output:\n{}", self.tool_name, self.origin, output)
        } else {
            format!("Tool '{}' failed: {}", self.tool_name, output)
        }
    }
}

/// Phases of one agent's turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Drafting,
    ToolPending,
    Finalizing,
    Complete,
}

/// One agent's finished contribution to an orchestration cycle
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub turn_id: u64,
    pub agent: AgentId,
    pub text: String,
    pub tool_results: Vec<ToolResult>,
    pub interjection: bool,
    /// The draft hit the output boundary
    pub truncated: bool,
    /// A continuation request was issued
    pub continued: bool,
    /// The final text still looks cut off
    pub incomplete: bool,
    /// Phase trace, ending in `Complete`
    pub phases: Vec<TurnPhase>,
    /// Invocations issued during this turn
    pub issued: Vec<InvocationId>,
}

impl AgentTurn {
    /// Every attached result was issued by this agent during this turn
    pub fn verify_provenance(&self) -> bool {
        self.tool_results.iter().all(|result| {
            result.agent == self.agent
                && result.invocation.turn == self.turn_id
                && self.issued.contains(&result.invocation)
        })
    }

    /// Window messages for this turn: tool results first, then the text
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .tool_results
            .iter()
            .cloned()
            .map(Message::tool_result)
            .collect();
        let mut reply = Message::agent(self.agent.clone(), self.text.clone());
        reply.complete = !self.incomplete;
        messages.push(reply);
        messages
    }
}
