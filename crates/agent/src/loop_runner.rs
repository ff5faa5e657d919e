//! The agent reasoning loop: call the provider, run the tools it asks for,
//! feed the results back, repeat until it answers in text.

use erpilot_core::error::ProviderError;
use erpilot_core::executor::ToolExecutor;
use erpilot_core::message::Message;
use erpilot_core::provider::{Provider, ProviderRequest};
use erpilot_core::turn::ToolCallRecord;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Default number of tool rounds before the loop forces a text answer.
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Answer used when the forced final call still yields no text.
pub const BUDGET_EXHAUSTED_MESSAGE: &str =
    "I couldn't complete the request within the tool budget. Please try a more specific question.";

/// What one successful run of the loop produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Final assistant text
    pub response: String,

    /// Every tool invocation, in execution order
    pub tool_calls_made: Vec<ToolCallRecord>,

    /// The answer came from the forced no-tools call
    pub max_iterations_reached: bool,

    /// Messages appended to the caller's history during this run
    pub messages: Vec<Message>,
}

/// A run aborted by a provider error.
///
/// Tools that already ran before the failure are kept so their side effects
/// stay visible to the caller.
#[derive(Debug, Clone)]
pub struct LoopFailure {
    pub error: ProviderError,
    pub tool_calls_made: Vec<ToolCallRecord>,
}

/// The core agent loop for one provider.
///
/// Holds no per-conversation state: every call to [`AgentLoop::run`] works on
/// its own message sequence, so one loop can serve concurrent requests.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool dispatch
    executor: ToolExecutor,

    /// Maximum tool rounds per turn
    max_rounds: u32,

    /// Seeded when the caller has no history
    system_prompt: String,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(provider: Arc<dyn Provider>, executor: ToolExecutor) -> Self {
        Self {
            provider,
            executor,
            max_rounds: DEFAULT_MAX_ROUNDS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Set the maximum number of tool rounds. Clamped to at least one.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    /// Replace the system preamble.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one user turn.
    ///
    /// Tool failures are fed back to the model as tool results. Provider
    /// failures abort the run and are returned with the partial tool log.
    pub async fn run(
        &self,
        history: &[Message],
        user_message: &str,
        caller_context: &Map<String, Value>,
    ) -> Result<LoopOutcome, LoopFailure> {
        let provider = self.provider.name();

        let mut messages = history.to_vec();
        if messages.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.push(Message::user(user_message));
        let turn_start = history.len();

        let catalog = if self.provider.supports_tools() {
            self.executor.catalog()
        } else {
            Vec::new()
        };

        info!(
            provider = %provider,
            history = history.len(),
            tools = catalog.len(),
            "Processing turn"
        );

        let mut tool_calls_made = Vec::new();

        for round in 1..=self.max_rounds {
            debug!(provider = %provider, round, "Agent loop round");

            let request = ProviderRequest::chat(messages.clone(), catalog.clone())
                .with_caller_context(caller_context.clone());
            let response = match self.provider.converse(request).await {
                Ok(response) => response,
                Err(error) => return Err(LoopFailure { error, tool_calls_made }),
            };

            if !response.wants_tools() {
                let text = response.message.text().to_string();
                messages.push(response.message);
                return Ok(LoopOutcome {
                    response: text,
                    tool_calls_made,
                    max_iterations_reached: false,
                    messages: messages.split_off(turn_start),
                });
            }

            let calls = response.message.tool_calls.clone();
            debug!(provider = %provider, round, tool_count = calls.len(), "Executing tool calls");
            messages.push(Message::assistant_tool_calls(
                response.message.content,
                calls.clone(),
            ));

            for call in &calls {
                let (arguments, result) = self.executor.execute_raw(&call.name, &call.arguments).await;
                messages.push(Message::tool_result(&call.id, result.to_content()));
                tool_calls_made.push(ToolCallRecord {
                    tool_name: call.name.clone(),
                    arguments,
                    result: result.to_value(),
                });
            }
        }

        warn!(
            provider = %provider,
            rounds = self.max_rounds,
            "Max tool rounds reached, forcing text response"
        );

        let request = ProviderRequest::chat(messages.clone(), Vec::new())
            .with_caller_context(caller_context.clone());
        let response = match self.provider.converse(request).await {
            Ok(response) => response,
            Err(error) => return Err(LoopFailure { error, tool_calls_made }),
        };
        let text = if response.message.text().trim().is_empty() {
            warn!(
                provider = %provider,
                "Provider gave no text on the final call, using budget message"
            );
            BUDGET_EXHAUSTED_MESSAGE.to_string()
        } else {
            response.message.text().to_string()
        };
        messages.push(Message::assistant(text.clone()));

        Ok(LoopOutcome {
            response: text,
            tool_calls_made,
            max_iterations_reached: true,
            messages: messages.split_off(turn_start),
        })
    }
}
