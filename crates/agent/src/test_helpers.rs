//! Shared test helpers for loop and coordinator tests.

use erpilot_core::error::{ProviderError, ToolError};
use erpilot_core::executor::ToolExecutor;
use erpilot_core::message::{Message, ToolCallRequest};
use erpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use erpilot_core::tool::{FnTool, ParamType, ToolParameter, ToolRegistry};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// A mock provider that replays scripted replies.
///
/// Each call returns the next reply; once the script runs out the last reply
/// repeats. Every request is recorded for inspection.
pub struct ScriptedProvider {
    name: String,
    replies: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
    tools: bool,
}

impl ScriptedProvider {
    pub fn new(name: &str, replies: Vec<ProviderResponse>) -> Self {
        Self::from_replies(name, replies.into_iter().map(Ok).collect())
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self::from_replies(name, vec![Err(error)])
    }

    pub fn from_replies(name: &str, replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            name: name.to_string(),
            replies,
            requests: Mutex::new(Vec::new()),
            tools: true,
        }
    }

    /// Behave like a text-only backend.
    pub fn without_tools(mut self) -> Self {
        self.tools = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn converse(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len().min(self.replies.len() - 1);
        requests.push(request);
        self.replies[index].clone()
    }

    fn supports_tools(&self) -> bool {
        self.tools
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a simple text response (no tool calls).
pub fn text(content: &str) -> ProviderResponse {
    response(Message::assistant(content))
}

/// Create a tool-only response.
pub fn tool_calls(calls: Vec<ToolCallRequest>) -> ProviderResponse {
    response(Message::assistant_tool_calls(None, calls))
}

/// Helper to create a tool call.
pub fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, args.to_string())
}

/// An executor with a stub `get_product_info` that only knows the Desk Lamp.
pub fn executor() -> ToolExecutor {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FnTool::new(
        "get_product_info",
        "Searches for a product by its name",
        vec![ToolParameter::required("product_name", ParamType::String, "Product name")],
        |args| async move {
            match args.get("product_name").and_then(Value::as_str) {
                Some("Desk Lamp") => Ok(json!({"id": 1, "name": "Desk Lamp", "list_price": 49.99})),
                Some(other) => Err(ToolError::failed(
                    "get_product_info",
                    format!("Product '{other}' not found."),
                )),
                None => Err(ToolError::InvalidArguments("product_name must be a string".into())),
            }
        },
    )));
    ToolExecutor::new(Arc::new(registry))
}
