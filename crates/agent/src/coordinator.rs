//! Provider fallback for whole turns.
//!
//! The primary backend runs the turn first when configured. If it fails for
//! any reason and a legacy backend is configured, the entire turn is retried
//! once against the legacy backend, starting again from the caller's history.
//! There is no backoff and no retry against the same backend.

use erpilot_config::AppConfig;
use erpilot_core::error::{ProviderError, ValidationError};
use erpilot_core::executor::ToolExecutor;
use erpilot_core::message::validate_history;
use erpilot_core::provider::ProviderOutcome;
use erpilot_core::tool::ToolRegistry;
use erpilot_core::turn::{AgentTurnResult, ChatRequest, TurnError};
use erpilot_providers::ProviderSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::loop_runner::{AgentLoop, LoopFailure, LoopOutcome};
use crate::prompt;

/// Shown when neither backend is configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "AI service is not configured. Please configure either \
OpenAI API key or external service URL.";

/// Runs chat turns against the configured backends.
pub struct FallbackCoordinator {
    primary: Option<AgentLoop>,
    legacy: Option<AgentLoop>,
}

impl FallbackCoordinator {
    /// Build with the default round budget and system preamble.
    pub fn new(providers: ProviderSet, executor: ToolExecutor) -> Self {
        Self {
            primary: providers
                .primary
                .map(|p| AgentLoop::new(p, executor.clone())),
            legacy: providers.legacy.map(|p| AgentLoop::new(p, executor)),
        }
    }

    /// Build from configuration: round budget and preamble come from `[agent]`.
    pub fn from_config(
        config: &AppConfig,
        providers: ProviderSet,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(providers, ToolExecutor::new(registry))
            .with_max_rounds(config.agent.max_rounds)
            .with_system_prompt(prompt::system_prompt(config.agent.system_prompt.as_deref()))
    }

    pub fn with_max_rounds(self, max: u32) -> Self {
        self.map_loops(|l| l.with_max_rounds(max))
    }

    pub fn with_system_prompt(self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.map_loops(|l| l.with_system_prompt(prompt.clone()))
    }

    fn map_loops(self, f: impl Fn(AgentLoop) -> AgentLoop) -> Self {
        Self {
            primary: self.primary.map(&f),
            legacy: self.legacy.map(&f),
        }
    }

    /// Whether at least one backend is available.
    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.legacy.is_some()
    }

    /// Handle one chat turn. Always returns a result; failures are reported
    /// through `success`, `error` and a user-facing `response`.
    pub async fn handle_chat(&self, request: ChatRequest) -> AgentTurnResult {
        if let Err(e) = validate(&request) {
            warn!(error = %e, "Rejected chat request");
            return AgentTurnResult::failure(format!("Invalid request: {e}"), e.into());
        }

        let mut attempts = Vec::new();
        match (&self.primary, &self.legacy) {
            (None, None) => {
                warn!("No AI backend configured");
                AgentTurnResult::failure(NOT_CONFIGURED_MESSAGE, TurnError::NotConfigured)
            }
            (Some(primary), legacy) => {
                let primary_err = match attempt(primary, &request, &mut attempts).await {
                    Ok(result) => return result.with_attempts(attempts),
                    Err(e) => e,
                };

                let Some(legacy) = legacy else {
                    return single_failure(primary.provider_name(), &primary_err, attempts);
                };

                warn!(
                    from = %primary.provider_name(),
                    to = %legacy.provider_name(),
                    error = %primary_err,
                    "Primary provider failed, retrying turn on fallback"
                );

                match attempt(legacy, &request, &mut attempts).await {
                    Ok(result) => result.with_attempts(attempts),
                    Err(legacy_err) => {
                        let message = format!(
                            "Both {} and {} failed. {}: {primary_err} {}: {legacy_err}",
                            primary.provider_name(),
                            legacy.provider_name(),
                            primary.provider_name(),
                            legacy.provider_name(),
                        );
                        warn!(%message, "All providers failed");
                        // The primary's error decides auth-vs-transient remediation.
                        failed_turn(
                            message,
                            TurnError::provider(primary.provider_name(), &primary_err),
                            attempts,
                        )
                    }
                }
            }
            (None, Some(legacy)) => match attempt(legacy, &request, &mut attempts).await {
                Ok(result) => result.with_attempts(attempts),
                Err(e) => single_failure(legacy.provider_name(), &e, attempts),
            },
        }
    }
}

fn validate(request: &ChatRequest) -> Result<(), ValidationError> {
    if request.message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    validate_history(&request.history)
}

/// Run the whole turn on one backend, recording the attempt.
async fn attempt(
    agent: &AgentLoop,
    request: &ChatRequest,
    attempts: &mut Vec<ProviderOutcome>,
) -> Result<AgentTurnResult, ProviderError> {
    let provider = agent.provider_name();
    info!(provider = %provider, "Running turn");

    let outcome = agent
        .run(&request.history, &request.message, &request.caller_context)
        .await;

    match outcome {
        Ok(LoopOutcome {
            response,
            tool_calls_made,
            max_iterations_reached,
            messages,
        }) => {
            info!(
                provider = %provider,
                tool_calls = tool_calls_made.len(),
                max_iterations_reached,
                "Turn complete"
            );
            attempts.push(
                ProviderOutcome::answered(provider, response.clone())
                    .with_tool_calls_made(tool_calls_made.clone()),
            );
            Ok(AgentTurnResult {
                response,
                tool_calls_made,
                success: true,
                max_iterations_reached,
                provider: Some(provider.to_string()),
                error: None,
                attempts: Vec::new(),
                messages,
            })
        }
        Err(LoopFailure {
            error,
            tool_calls_made,
        }) => {
            warn!(
                provider = %provider,
                kind = error.kind(),
                error = %error,
                tool_calls = tool_calls_made.len(),
                "Provider failed"
            );
            attempts.push(
                ProviderOutcome::failure(provider, error.clone()).with_tool_calls_made(tool_calls_made),
            );
            Err(error)
        }
    }
}

fn single_failure(
    provider: &str,
    error: &ProviderError,
    attempts: Vec<ProviderOutcome>,
) -> AgentTurnResult {
    failed_turn(
        format!("Error: {error}"),
        TurnError::provider(provider, error),
        attempts,
    )
}

/// A failed turn still reports every tool that ran, across all attempts.
fn failed_turn(message: String, error: TurnError, attempts: Vec<ProviderOutcome>) -> AgentTurnResult {
    let mut result = AgentTurnResult::failure(message, error);
    result.tool_calls_made = attempts
        .iter()
        .flat_map(|a| a.tool_calls_made.iter().cloned())
        .collect();
    result.with_attempts(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, call, executor, text, tool_calls};
    use erpilot_core::message::Message;
    use erpilot_core::provider::Provider;
    use serde_json::json;

    fn coordinator(
        primary: Option<&Arc<ScriptedProvider>>,
        legacy: Option<&Arc<ScriptedProvider>>,
    ) -> FallbackCoordinator {
        let set = ProviderSet::new(
            primary.map(|p| p.clone() as Arc<dyn Provider>),
            legacy.map(|p| p.clone() as Arc<dyn Provider>),
        );
        FallbackCoordinator::new(set, executor())
    }

    fn network_down() -> ProviderError {
        ProviderError::Network("connection refused".into())
    }

    #[tokio::test]
    async fn hello_returns_literal_text() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("Hi there!")]));
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("Hello"))
            .await;

        assert!(result.success);
        assert_eq!(result.response, "Hi there!");
        assert!(result.tool_calls_made.is_empty());
        assert_eq!(result.provider.as_deref(), Some("openai"));
        assert!(result.error.is_none());
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn nothing_configured_makes_no_calls() {
        let result = coordinator(None, None)
            .handle_chat(ChatRequest::new("Hello"))
            .await;
        assert!(!result.success);
        assert_eq!(result.response, NOT_CONFIGURED_MESSAGE);
        assert!(matches!(result.error, Some(TurnError::NotConfigured)));
        assert!(result.provider.is_none());
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_legacy() {
        let primary = Arc::new(ScriptedProvider::failing("openai", network_down()));
        let legacy = Arc::new(ScriptedProvider::new("legacy", vec![text("From legacy.")]).without_tools());
        let result = coordinator(Some(&primary), Some(&legacy))
            .handle_chat(ChatRequest::new("Hello"))
            .await;

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("legacy"));
        assert_eq!(result.response, "From legacy.");
        let tried: Vec<_> = result.attempts.iter().map(|a| (a.provider.as_str(), a.success)).collect();
        assert_eq!(tried, vec![("openai", false), ("legacy", true)]);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(legacy.call_count(), 1);
    }

    #[tokio::test]
    async fn fallback_restarts_from_caller_history() {
        // Primary runs a tool, then dies on round 2.
        let primary = Arc::new(ScriptedProvider::from_replies(
            "openai",
            vec![
                Ok(tool_calls(vec![call(
                    "c1",
                    "get_product_info",
                    json!({"product_name": "Desk Lamp"}),
                )])),
                Err(network_down()),
            ],
        ));
        let legacy = Arc::new(ScriptedProvider::new("legacy", vec![text("fine")]).without_tools());
        let history = vec![Message::user("earlier"), Message::assistant("sure")];

        let result = coordinator(Some(&primary), Some(&legacy))
            .handle_chat(ChatRequest::new("lamp price?").with_history(history))
            .await;

        assert!(result.success);
        assert_eq!(primary.call_count(), 2);
        // The answer's own log is legacy's; the primary's executed call stays on its attempt.
        assert!(result.tool_calls_made.is_empty());
        assert!(!result.attempts[0].success);
        assert_eq!(result.attempts[0].tool_calls_made.len(), 1);
        assert_eq!(result.attempts[0].tool_calls_made[0].tool_name, "get_product_info");
        let json = serde_json::to_value(&result.attempts[0]).unwrap();
        assert_eq!(json["tool_calls_made"][0]["tool_name"], "get_product_info");
        let sent = &legacy.requests()[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].text(), "lamp price?");
        assert_eq!(result.messages.len(), 2);
    }

    #[tokio::test]
    async fn primary_success_never_touches_legacy() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("ok")]));
        let legacy = Arc::new(ScriptedProvider::new("legacy", vec![text("unused")]));
        coordinator(Some(&primary), Some(&legacy))
            .handle_chat(ChatRequest::new("Hello"))
            .await;
        assert_eq!(legacy.call_count(), 0);
    }

    #[tokio::test]
    async fn both_failures_are_named() {
        let primary = Arc::new(ScriptedProvider::failing(
            "openai",
            ProviderError::AuthenticationFailed("Invalid API key".into()),
        ));
        let legacy = Arc::new(ScriptedProvider::failing(
            "legacy",
            ProviderError::Timeout("30s".into()),
        ));
        let result = coordinator(Some(&primary), Some(&legacy))
            .handle_chat(ChatRequest::new("Hello"))
            .await;

        assert!(!result.success);
        assert!(result.response.starts_with("Both openai and legacy failed."));
        assert!(result.response.contains("Invalid API key"));
        assert!(result.response.contains("30s"));
        match result.error {
            Some(TurnError::Provider { auth, .. }) => assert!(auth),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn legacy_only_is_used_directly() {
        let legacy = Arc::new(ScriptedProvider::new("legacy", vec![text("legacy answer")]));
        let result = coordinator(None, Some(&legacy))
            .handle_chat(ChatRequest::new("Hello"))
            .await;
        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("legacy"));
    }

    #[tokio::test]
    async fn primary_only_failure_is_reported() {
        let primary = Arc::new(ScriptedProvider::failing("openai", network_down()));
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("Hello"))
            .await;
        assert!(!result.success);
        assert!(result.response.contains("connection refused"));
        match result.error {
            Some(TurnError::Provider { provider, auth, .. }) => {
                assert_eq!(provider, "openai");
                assert!(!auth);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_calls() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("unused")]));
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("   \n"))
            .await;
        assert!(!result.success);
        assert!(matches!(result.error, Some(TurnError::Validation(_))));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn orphan_tool_result_in_history_is_rejected() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("unused")]));
        let history = vec![Message::user("hi"), Message::tool_result("ghost", "{}")];
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("Hello").with_history(history))
            .await;
        assert!(matches!(result.error, Some(TurnError::Validation(_))));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_turn_reports_tools_already_run() {
        let primary = Arc::new(ScriptedProvider::from_replies(
            "openai",
            vec![
                Ok(tool_calls(vec![call(
                    "c1",
                    "get_product_info",
                    json!({"product_name": "Desk Lamp"}),
                )])),
                Err(network_down()),
            ],
        ));
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("lamp price?"))
            .await;

        assert!(!result.success);
        assert_eq!(result.tool_calls_made.len(), 1);
        assert_eq!(result.tool_calls_made[0].result["name"], "Desk Lamp");
        assert_eq!(result.attempts[0].tool_calls_made, result.tool_calls_made);
    }

    #[tokio::test]
    async fn duplicate_tool_result_in_history_is_rejected() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("unused")]));
        let history = vec![
            Message::user("lamp?"),
            Message::assistant_tool_calls(None, vec![call("a", "get_product_info", json!({}))]),
            Message::tool_result("a", "{}"),
            Message::tool_result("a", "{}"),
        ];
        let result = coordinator(Some(&primary), None)
            .handle_chat(ChatRequest::new("Hello").with_history(history))
            .await;
        assert!(!result.success);
        assert!(matches!(result.error, Some(TurnError::Validation(_))));
        assert!(result.response.contains("repeats call id 'a'"));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn unanswered_tool_call_in_history_is_rejected() {
        let primary = Arc::new(ScriptedProvider::new("openai", vec![text("unused")]));
        let legacy = Arc::new(ScriptedProvider::new("legacy", vec![text("unused")]));
        let history = vec![
            Message::user("lamp and leads?"),
            Message::assistant_tool_calls(
                None,
                vec![
                    call("a", "get_product_info", json!({})),
                    call("b", "fetch_all_leads", json!({})),
                ],
            ),
            Message::tool_result("a", "{}"),
            Message::user("well?"),
        ];
        let result = coordinator(Some(&primary), Some(&legacy))
            .handle_chat(ChatRequest::new("Hello").with_history(history))
            .await;
        assert!(matches!(result.error, Some(TurnError::Validation(_))));
        assert!(result.response.contains("'b'"));
        assert_eq!(primary.call_count(), 0);
        assert_eq!(legacy.call_count(), 0);
    }

    #[tokio::test]
    async fn config_sets_round_budget() {
        let primary = Arc::new(ScriptedProvider::new(
            "openai",
            vec![tool_calls(vec![call("x", "get_product_info", json!({"product_name": "Desk Lamp"}))])],
        ));
        let mut config = AppConfig::default();
        config.agent.max_rounds = 2;
        let set = ProviderSet::new(Some(primary.clone() as Arc<dyn Provider>), None);
        let registry = Arc::new(ToolRegistry::new());

        let result = FallbackCoordinator::from_config(&config, set, registry)
            .handle_chat(ChatRequest::new("loop"))
            .await;
        assert!(result.success);
        assert!(result.max_iterations_reached);
        assert_eq!(primary.call_count(), 3);
        // Unknown tool in an empty registry still yields a logged error result.
        assert_eq!(result.tool_calls_made.len(), 2);
        assert!(result.tool_calls_made[0].result["error"].is_string());
    }
}
