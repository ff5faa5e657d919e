//! Inbound chat request and per-turn result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProviderError, ValidationError};
use crate::message::Message;
use crate::provider::ProviderOutcome;

/// What the host hands to the orchestrator for one user turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message. Must contain non-whitespace text.
    pub message: String,

    /// Prior conversation, oldest first. Empty on the first turn.
    #[serde(default)]
    pub history: Vec<Message>,

    /// Caller identity (database, login, company...) forwarded untouched to
    /// backends that need it.
    #[serde(default)]
    pub caller_context: serde_json::Map<String, Value>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_caller_context(mut self, caller_context: serde_json::Map<String, Value>) -> Self {
        self.caller_context = caller_context;
        self
    }
}

/// One entry of the audit log of tool calls made during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
}

/// Why a turn did not produce an answer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TurnError {
    /// Bad input; no provider was called
    Validation(String),
    /// Neither backend is configured; no provider was called
    NotConfigured,
    /// Every attempted backend failed
    Provider {
        provider: String,
        #[serde(rename = "error_kind")]
        kind: String,
        message: String,
        auth: bool,
    },
}

impl TurnError {
    pub fn provider(provider: impl Into<String>, error: &ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            auth: error.is_auth(),
        }
    }
}

impl From<ValidationError> for TurnError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// The result of one `handle_chat` call. Always returned, never thrown.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTurnResult {
    /// Final text shown to the user (answer or error message)
    pub response: String,

    /// Every tool invocation made while producing the answer, in order
    pub tool_calls_made: Vec<ToolCallRecord>,

    pub success: bool,

    /// The round budget ran out and the answer came from a forced final call
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub max_iterations_reached: bool,

    /// Identity tag of the provider that produced `response`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnError>,

    /// One entry per backend tried, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderOutcome>,

    /// Messages appended during this turn (user message onward). Append these
    /// to the caller's history to continue the conversation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl AgentTurnResult {
    pub fn failure(response: impl Into<String>, error: TurnError) -> Self {
        Self {
            response: response.into(),
            tool_calls_made: Vec::new(),
            success: false,
            max_iterations_reached: false,
            provider: None,
            error: Some(error),
            attempts: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<ProviderOutcome>) -> Self {
        self.attempts = attempts;
        self
    }
}
