//! Tool executor: the boundary where tool failures become data.
//!
//! Whatever happens inside a tool (unknown name, missing argument, domain
//! error, panic) the caller gets a [`ToolResult`] back. Nothing propagates.

use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::tool::{ToolArgs, ToolRegistry, ToolResult};

/// Dispatches tool calls against a shared registry.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The provider-facing catalog.
    pub fn catalog(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Execute a tool with already-parsed arguments.
    pub async fn execute(&self, name: &str, arguments: Value) -> ToolResult {
        let start = Instant::now();
        let result = self.dispatch(name, arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            ToolResult::Success(_) => debug!(tool = %name, duration_ms, "Tool executed"),
            ToolResult::Error(e) => warn!(tool = %name, duration_ms, error = %e, "Tool returned an error"),
        }
        result
    }

    /// Parse the provider's raw argument text, then execute.
    ///
    /// Returns the arguments as they should appear in the audit log (the
    /// parsed value, or the raw text when it did not parse) with the result.
    pub async fn execute_raw(&self, name: &str, raw_arguments: &str) -> (Value, ToolResult) {
        match parse_arguments(raw_arguments) {
            Ok(arguments) => {
                let result = self.execute(name, arguments.clone()).await;
                (arguments, result)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Malformed tool arguments");
                (
                    Value::String(raw_arguments.to_string()),
                    ToolResult::error(format!("Failed to parse tool arguments: {e}")),
                )
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> ToolResult {
        let tool = match self.registry.resolve(name) {
            Ok(tool) => tool,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let schema = tool.schema();
        let required: Vec<&str> = schema.required().collect();
        let args = match validate_arguments(&required, arguments) {
            Ok(args) => args,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(result) => result.into(),
            Err(panic) => ToolResult::error(format!(
                "Tool '{name}' panicked: {}",
                panic_message(panic.as_ref())
            )),
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    // Some providers send "" for tools without parameters.
    if raw.trim().is_empty() {
        return Ok(Value::Object(ToolArgs::new()));
    }
    serde_json::from_str(raw)
}

fn validate_arguments(required: &[&str], arguments: Value) -> Result<ToolArgs, ToolError> {
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => ToolArgs::new(),
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {other}"
            )));
        }
    };

    for field in required {
        if args.get(*field).is_none_or(Value::is_null) {
            return Err(ToolError::InvalidArguments(format!(
                "missing required argument '{field}'"
            )));
        }
    }

    Ok(args)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
