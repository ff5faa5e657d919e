//! Message domain types.
//!
//! These are the value objects that flow through a single chat turn:
//! the caller supplies history, the agent loop appends to it, and the
//! provider sees the whole sequence on every round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (capability preamble)
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(default = "new_id")]
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. `None` for assistant turns that only carry tool calls.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Create an assistant message that records the tool calls it requested.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(content.into()));
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Text content, or the empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool invocation requested by the provider inside an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque ID, unique within one assistant turn
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as raw JSON text, exactly as the provider emitted them
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Check the request→result pairing of a caller-supplied history.
///
/// Every call emitted by an assistant message must get exactly one tool
/// message, and those results must directly follow it. Tool messages that
/// reference any other id are rejected.
pub fn validate_history(messages: &[Message]) -> Result<(), ValidationError> {
    let mut open_ids: Vec<&str> = Vec::new();
    let mut answered: Vec<&str> = Vec::new();

    for (index, msg) in messages.iter().enumerate() {
        if msg.role == Role::Tool {
            let call_id = msg
                .tool_call_id
                .as_deref()
                .ok_or(ValidationError::MissingToolCallId { index })?;
            if answered.contains(&call_id) {
                return Err(ValidationError::DuplicateToolResult {
                    index,
                    call_id: call_id.to_string(),
                });
            }
            let Some(pos) = open_ids.iter().position(|id| *id == call_id) else {
                return Err(ValidationError::OrphanToolResult {
                    index,
                    call_id: call_id.to_string(),
                });
            };
            answered.push(open_ids.remove(pos));
            continue;
        }

        if let Some(call_id) = open_ids.first() {
            return Err(ValidationError::UnansweredToolCall {
                index,
                call_id: call_id.to_string(),
            });
        }
        answered.clear();
        if msg.role == Role::Assistant {
            open_ids = msg.tool_calls.iter().map(|tc| tc.id.as_str()).collect();
        }
    }

    // The new user message would follow, so pending calls are still unanswered.
    match open_ids.first() {
        Some(call_id) => Err(ValidationError::UnansweredToolCall {
            index: messages.len(),
            call_id: call_id.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_only_assistant_message_has_no_content() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![ToolCallRequest::new("call_1", "fetch_all_products", "{}")],
        );
        assert!(msg.content.is_none());
        assert!(msg.has_tool_calls());
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn history_without_ids_deserializes() {
        let json = r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#;
        let history: Vec<Message> = serde_json::from_str(json).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(!history[0].id.is_empty());
    }

    #[test]
    fn paired_history_is_valid() {
        let history = vec![
            Message::user("price of the lamp?"),
            Message::assistant_tool_calls(
                None,
                vec![
                    ToolCallRequest::new("a", "get_product_info", "{}"),
                    ToolCallRequest::new("b", "fetch_all_products", "{}"),
                ],
            ),
            Message::tool_result("a", "{}"),
            Message::tool_result("b", "[]"),
            Message::assistant("49.99"),
        ];
        assert!(validate_history(&history).is_ok());
    }

    #[test]
    fn orphan_tool_result_is_rejected() {
        let history = vec![
            Message::assistant_tool_calls(None, vec![ToolCallRequest::new("a", "x", "{}")]),
            Message::tool_result("a", "{}"),
            Message::user("next"),
            Message::tool_result("a", "{}"),
        ];
        let err = validate_history(&history).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OrphanToolResult {
                index: 3,
                call_id: "a".into()
            }
        );
    }

    #[test]
    fn tool_result_without_id_is_rejected() {
        let mut msg = Message::tool_result("a", "{}");
        msg.tool_call_id = None;
        let err = validate_history(&[msg]).unwrap_err();
        assert_eq!(err, ValidationError::MissingToolCallId { index: 0 });
    }

    #[test]
    fn repeated_tool_result_is_rejected() {
        let history = vec![
            Message::user("lamp?"),
            Message::assistant_tool_calls(None, vec![ToolCallRequest::new("a", "get_product_info", "{}")]),
            Message::tool_result("a", "{}"),
            Message::tool_result("a", "{}"),
        ];
        let err = validate_history(&history).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateToolResult {
                index: 3,
                call_id: "a".into()
            }
        );
    }

    #[test]
    fn unanswered_call_before_next_message_is_rejected() {
        let history = vec![
            Message::user("lamp and leads?"),
            Message::assistant_tool_calls(
                None,
                vec![
                    ToolCallRequest::new("a", "get_product_info", "{}"),
                    ToolCallRequest::new("b", "fetch_all_leads", "{}"),
                ],
            ),
            Message::tool_result("a", "{}"),
            Message::user("well?"),
        ];
        let err = validate_history(&history).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnansweredToolCall {
                index: 3,
                call_id: "b".into()
            }
        );
    }

    #[test]
    fn history_ending_on_pending_calls_is_rejected() {
        let history = vec![
            Message::user("leads?"),
            Message::assistant_tool_calls(None, vec![ToolCallRequest::new("a", "fetch_all_leads", "{}")]),
        ];
        let err = validate_history(&history).unwrap_err();
        assert!(matches!(err, ValidationError::UnansweredToolCall { index: 2, .. }));
    }
}
