//! Connection probe: a minimal round trip under a hard wall-clock deadline.
//!
//! The request runs on a spawned worker. When the deadline passes the join
//! handle is dropped, which detaches the worker rather than aborting it; the
//! underlying HTTP client still enforces its own timeout.

use erpilot_config::ProbeConfig;
use erpilot_core::message::Message;
use erpilot_core::provider::{Provider, ProviderRequest, ToolChoice};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::router::ProviderSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Failed,
    Timeout,
}

/// Result of probing one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub provider: String,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The provider rejected the credential
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auth_failure: bool,
    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

/// Sends a tiny prompt to a provider and waits at most `timeout` for it.
#[derive(Debug, Clone)]
pub struct ConnectionProbe {
    timeout: Duration,
    prompt: String,
    legacy_prompt: String,
    max_tokens: u32,
}

impl ConnectionProbe {
    pub fn new(timeout: Duration) -> Self {
        let defaults = ProbeConfig::default();
        Self {
            timeout,
            prompt: defaults.prompt,
            legacy_prompt: defaults.legacy_prompt,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            timeout: config.timeout(),
            prompt: config.prompt.clone(),
            legacy_prompt: config.legacy_prompt.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, prompt: &str) -> ProviderRequest {
        ProviderRequest {
            messages: vec![Message::user(prompt)],
            tool_choice: ToolChoice::None,
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.0),
            ..ProviderRequest::default()
        }
    }

    /// Probe one provider. Never fails; every outcome is reported as data.
    pub async fn probe(&self, provider: Arc<dyn Provider>) -> ProbeOutcome {
        self.probe_with(provider, &self.prompt).await
    }

    /// Probe the legacy service with its conversational test message.
    pub async fn probe_legacy(&self, provider: Arc<dyn Provider>) -> ProbeOutcome {
        self.probe_with(provider, &self.legacy_prompt).await
    }

    async fn probe_with(&self, provider: Arc<dyn Provider>, prompt: &str) -> ProbeOutcome {
        let name = provider.name().to_string();
        let request = self.request(prompt);
        let start = Instant::now();

        let worker = tokio::spawn(async move { provider.converse(request).await });

        let (status, response, error, auth_failure) =
            match tokio::time::timeout(self.timeout, worker).await {
                Ok(Ok(Ok(resp))) => (
                    ProbeStatus::Ok,
                    Some(resp.message.text().to_string()),
                    None,
                    false,
                ),
                Ok(Ok(Err(e))) => (ProbeStatus::Failed, None, Some(e.to_string()), e.is_auth()),
                Ok(Err(join_error)) => (
                    ProbeStatus::Failed,
                    None,
                    Some(format!("probe worker failed: {join_error}")),
                    false,
                ),
                Err(_) => (
                    ProbeStatus::Timeout,
                    None,
                    Some(format!(
                        "no reply within {}s",
                        self.timeout.as_secs_f32()
                    )),
                    false,
                ),
            };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match status {
            ProbeStatus::Ok => info!(provider = %name, elapsed_ms, "Probe succeeded"),
            _ => warn!(provider = %name, ?status, elapsed_ms, error = ?error, "Probe failed"),
        }

        ProbeOutcome {
            provider: name,
            status,
            response,
            error,
            auth_failure,
            elapsed_ms,
        }
    }
}

/// Per-backend section of a [`ConnectionReport`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderCheck {
    pub configured: bool,
    pub tested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ProbeOutcome>,
}

impl ProviderCheck {
    pub fn success(&self) -> bool {
        self.outcome.as_ref().is_some_and(ProbeOutcome::is_ok)
    }
}

fn checked(outcome: ProbeOutcome) -> ProviderCheck {
    ProviderCheck {
        configured: true,
        tested: true,
        outcome: Some(outcome),
    }
}

/// Administrative "test connection" summary across both backends.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub primary: ProviderCheck,
    pub legacy: ProviderCheck,
    /// Identity tags of the backends that answered
    pub available: Vec<String>,
    pub overall_success: bool,
    pub message: String,
}

/// Probe every configured provider, sequentially, primary first.
///
/// Unconfigured backends are reported without any network traffic.
pub async fn check_connections(providers: &ProviderSet, probe: &ConnectionProbe) -> ConnectionReport {
    let primary = match &providers.primary {
        Some(p) => checked(probe.probe(p.clone()).await),
        None => ProviderCheck::default(),
    };
    let legacy = match &providers.legacy {
        Some(p) => checked(probe.probe_legacy(p.clone()).await),
        None => ProviderCheck::default(),
    };

    let available: Vec<String> = [&primary, &legacy]
        .into_iter()
        .filter_map(|c| c.outcome.as_ref())
        .filter(|o| o.is_ok())
        .map(|o| o.provider.clone())
        .collect();

    let message = if !primary.configured && !legacy.configured {
        "Neither a primary API key nor a legacy service URL is configured".to_string()
    } else if available.is_empty() {
        "AI services are configured but none are working".to_string()
    } else {
        format!("AI services available: {}", available.join(", "))
    };

    ConnectionReport {
        primary,
        legacy,
        overall_success: !available.is_empty(),
        available,
        message,
    }
}
