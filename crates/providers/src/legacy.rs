//! Legacy chat microservice provider.
//!
//! The service runs its own tools remotely, so it takes a flat
//! message-in/text-out request and never asks us to execute anything.

use async_trait::async_trait;
use erpilot_config::LegacyConfig;
use erpilot_core::error::ProviderError;
use erpilot_core::message::{Message, Role};
use erpilot_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Reply text used when the service answers without a `response` field.
const NO_RESPONSE: &str = "No response received";

/// Client for `POST {service_url}/ai/chat`.
pub struct LegacyProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LegacyProvider {
    pub fn new(
        service_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("erpilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/ai/chat", service_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    /// Build from the `[legacy]` config section.
    pub fn from_config(config: &LegacyConfig) -> Result<Self, ProviderError> {
        let url = config
            .service_url
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("legacy service URL is not set".into()))?;
        Self::new(
            url,
            config.api_key.clone(),
            config.timeout(),
            config.connect_timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Split the conversation into the latest user message and the prior
    /// user/assistant turns the service expects as history.
    fn to_payload(request: &ProviderRequest) -> Result<LegacyRequest, ProviderError> {
        let last_user = request
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or_else(|| ProviderError::Protocol("conversation has no user message".into()))?;

        let conversation_history = request.messages[..last_user]
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .filter(|m| !m.text().is_empty())
            .map(|m| HistoryEntry {
                role: m.role.as_str().to_string(),
                content: m.text().to_string(),
            })
            .collect();

        Ok(LegacyRequest {
            message: request.messages[last_user].text().to_string(),
            conversation_history,
            caller_context: request.caller_context.clone(),
            timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        })
    }
}

#[async_trait]
impl Provider for LegacyProvider {
    fn name(&self) -> &str {
        "legacy"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    async fn converse(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let payload = Self::to_payload(&request)?;

        debug!(
            endpoint = %self.endpoint,
            history = payload.conversation_history.len(),
            "Sending legacy chat request"
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder
                .header("Authorization", format!("Bearer {key}"))
                .header("X-API-Key", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(format!("Legacy service timed out: {e}"))
            } else {
                ProviderError::Network(format!("Unable to connect to legacy service: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(format!(
                "Legacy service rejected credentials (HTTP {status})"
            )));
        }
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Legacy service returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: format!("Legacy service returned HTTP {status}: {body}"),
            });
        }

        let reply: LegacyReply = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("Invalid legacy response: {e}")))?;

        Ok(ProviderResponse {
            message: Message::assistant(reply.response.unwrap_or_else(|| NO_RESPONSE.into())),
            usage: None,
            model: "legacy".into(),
        })
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct LegacyRequest {
    message: String,
    conversation_history: Vec<HistoryEntry>,
    /// The deployed service reads the identity blob under this key.
    #[serde(rename = "odoo_credentials")]
    caller_context: serde_json::Map<String, serde_json::Value>,
    /// Seconds since the Unix epoch
    timestamp: f64,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct LegacyReply {
    #[serde(default)]
    response: Option<String>,
}
