pub mod chat;
pub mod init;
pub mod probe;
pub mod tools;

use erpilot_config::AppConfig;
use erpilot_core::turn::TurnError;
use std::path::Path;
use tracing::debug;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load(),
    };
    let config = config.map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(?config, "Configuration loaded");
    Ok(config)
}

/// What the user should do about a failed turn.
pub fn remediation(error: &TurnError) -> &'static str {
    match error {
        TurnError::Validation(_) => "Rephrase the request and try again.",
        TurnError::NotConfigured => {
            "Set primary.api_key (or OPENAI_API_KEY) or legacy.service_url, then run `erpilot probe`."
        }
        TurnError::Provider { auth: true, .. } => {
            "The API key was rejected. Check primary.api_key / legacy.api_key in your config."
        }
        TurnError::Provider { .. } => {
            "The AI service could not be reached. This is usually temporary; try again shortly."
        }
    }
}
