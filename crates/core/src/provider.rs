//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an upstream service and get
//! back either a final message or a set of requested tool calls.
//!
//! Implementations: OpenAI-compatible chat completions, legacy HTTP microservice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{Message, ToolCallRequest};
use crate::turn::ToolCallRecord;

/// Whether the model may call tools on this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides (sent as `"auto"`)
    #[default]
    Auto,
    /// No tools are offered; the model must answer in text
    None,
}

/// A single call to a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Capability catalog offered to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Caller identity blob, forwarded untouched to backends that want it
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub caller_context: serde_json::Map<String, serde_json::Value>,

    /// Probe-only override; chat rounds use the provider's configured value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Probe-only override; chat rounds use the provider's configured value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderRequest {
    /// A chat round offering the given catalog.
    pub fn chat(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        let tool_choice = if tools.is_empty() { ToolChoice::None } else { ToolChoice::Auto };
        Self {
            messages,
            tools,
            tool_choice,
            ..Self::default()
        }
    }

    pub fn with_caller_context(
        mut self,
        caller_context: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.caller_context = caller_context;
        self
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (text, tool calls, or both)
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl ProviderResponse {
    /// Whether the provider asked for tools instead of answering.
    pub fn wants_tools(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Flattened view of one provider attempt, as reported alongside a turn
/// result rather than consumed by the loop.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub provider: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Tools this backend actually ran during the attempt, even if it failed later
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls_made: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "error_as_string")]
    pub error: Option<ProviderError>,
}

fn error_as_string<S: serde::Serializer>(
    error: &Option<ProviderError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ProviderOutcome {
    pub fn from_result(
        provider: impl Into<String>,
        result: std::result::Result<ProviderResponse, ProviderError>,
    ) -> Self {
        let provider = provider.into();
        match result {
            Ok(resp) => Self {
                provider,
                success: true,
                response: resp.message.content,
                tool_calls: resp.message.tool_calls,
                tool_calls_made: Vec::new(),
                error: None,
            },
            Err(e) => Self::failure(provider, e),
        }
    }

    /// A terminal text answer.
    pub fn answered(provider: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            success: true,
            response: Some(response.into()),
            tool_calls: Vec::new(),
            tool_calls_made: Vec::new(),
            error: None,
        }
    }

    pub fn failure(provider: impl Into<String>, error: ProviderError) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            response: None,
            tool_calls: Vec::new(),
            tool_calls_made: Vec::new(),
            error: Some(error),
        }
    }

    pub fn with_tool_calls_made(mut self, records: Vec<ToolCallRecord>) -> Self {
        self.tool_calls_made = records;
        self
    }
}

/// The core Provider trait.
///
/// Both backends implement this trait. The agent loop calls `converse()`
/// without knowing which one it is talking to.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identity tag reported in results (e.g. "openai", "legacy").
    fn name(&self) -> &str;

    /// Send the conversation and get a complete response.
    async fn converse(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Whether this backend accepts a tool catalog. Backends that run their
    /// own tools remotely return `false` and only ever answer in text.
    fn supports_tools(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_without_tools_disables_tool_choice() {
        let req = ProviderRequest::chat(vec![Message::user("hi")], vec![]);
        assert_eq!(req.tool_choice, ToolChoice::None);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn last_user_message_skips_later_roles() {
        let req = ProviderRequest::chat(
            vec![
                Message::system("preamble"),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
                Message::tool_result("x", "{}"),
            ],
            vec![],
        );
        assert_eq!(req.last_user_message().unwrap().text(), "second");
    }

    #[test]
    fn outcome_from_error_keeps_detail() {
        let outcome = ProviderOutcome::from_result(
            "legacy",
            Err(ProviderError::ApiError {
                status_code: 503,
                message: "unavailable".into(),
            }),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.provider, "legacy");
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["error"].as_str().unwrap().contains("503"));
    }

    #[test]
    fn outcome_from_tool_response() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![ToolCallRequest::new("c1", "fetch_all_leads", "{}")],
        );
        let outcome = ProviderOutcome::from_result(
            "openai",
            Ok(ProviderResponse {
                message: msg,
                usage: None,
                model: "gpt-4o-mini".into(),
            }),
        );
        assert!(outcome.success);
        assert!(outcome.response.is_none());
        assert_eq!(outcome.tool_calls.len(), 1);
    }
}
