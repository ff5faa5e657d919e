//! Configuration loading, validation, and management for erpilot.
//!
//! Loads configuration from `~/.erpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup. The resulting
//! [`AppConfig`] is passed explicitly into the provider, tool and agent
//! constructors; nothing reads global state afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.erpilot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Primary LLM provider (OpenAI-compatible chat completions)
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Legacy chat microservice
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Connection probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Business data backend used by the built-in tools
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Identity tag reported in turn results
    #[serde(default = "default_primary_name")]
    pub name: String,

    #[serde(default = "default_primary_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout for a single completion call
    #[serde(default = "default_primary_timeout")]
    pub timeout_secs: u64,
}

fn default_primary_name() -> String {
    "openai".into()
}
fn default_primary_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_primary_timeout() -> u64 {
    60
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            name: default_primary_name(),
            base_url: default_primary_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_primary_timeout(),
        }
    }
}

impl PrimaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for PrimaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryConfig")
            .field("api_key", &redact(&self.api_key))
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Base URL of the service; requests go to `{service_url}/ai/chat`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_legacy_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_legacy_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_legacy_timeout() -> u64 {
    30
}
fn default_legacy_connect_timeout() -> u64 {
    10
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            api_key: None,
            timeout_secs: default_legacy_timeout(),
            connect_timeout_secs: default_legacy_connect_timeout(),
        }
    }
}

impl LegacyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl std::fmt::Debug for LegacyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyConfig")
            .field("service_url", &self.service_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum provider rounds before the forced final call
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Replace the built-in capability preamble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_rounds() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Hard wall-clock deadline for one probe
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_prompt")]
    pub prompt: String,

    /// Message sent to the legacy service, which answers full sentences
    #[serde(default = "default_legacy_probe_prompt")]
    pub legacy_prompt: String,

    #[serde(default = "default_probe_max_tokens")]
    pub max_tokens: u32,

    /// Probe the legacy service as well as the primary provider
    #[serde(default = "default_true")]
    pub include_legacy: bool,
}

fn default_probe_timeout() -> u64 {
    45
}
fn default_probe_prompt() -> String {
    "Say 'OK'".into()
}
fn default_legacy_probe_prompt() -> String {
    "Hello, this is a connection test.".into()
}
fn default_probe_max_tokens() -> u32 {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            prompt: default_probe_prompt(),
            legacy_prompt: default_legacy_probe_prompt(),
            max_tokens: default_probe_max_tokens(),
            include_legacy: true,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which data backend the built-in tools talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Seeded in-process records (demo and tests)
    #[default]
    Memory,
    /// Remote ERP over JSON-RPC
    JsonRpc,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.erpilot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ERPILOT_API_KEY`, then `OPENAI_API_KEY` (primary credential)
    /// - `ERPILOT_MODEL`
    /// - `ERPILOT_SERVICE_URL`, `ERPILOT_LEGACY_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup. Blank values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("ERPILOT_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.primary.api_key = Some(key);
        }
        if let Some(model) = get("ERPILOT_MODEL") {
            self.primary.model = model;
        }
        if let Some(url) = get("ERPILOT_SERVICE_URL") {
            self.legacy.service_url = Some(url);
        }
        if let Some(key) = get("ERPILOT_LEGACY_API_KEY") {
            self.legacy.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".erpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.primary.temperature) {
            return Err(ConfigError::ValidationError(
                "primary.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }

        for (field, secs) in [
            ("primary.timeout_secs", self.primary.timeout_secs),
            ("legacy.timeout_secs", self.legacy.timeout_secs),
            ("legacy.connect_timeout_secs", self.legacy.connect_timeout_secs),
            ("probe.timeout_secs", self.probe.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!("{field} must be > 0")));
            }
        }

        check_url("primary.base_url", Some(&self.primary.base_url))?;
        check_url("legacy.service_url", self.legacy.service_url.as_ref())?;
        check_url("backend.url", self.backend.url.as_ref())?;

        if self.backend.kind == BackendKind::JsonRpc
            && (self.backend.url.is_none()
                || self.backend.database.is_none()
                || self.backend.username.is_none())
        {
            return Err(ConfigError::ValidationError(
                "backend.kind = \"jsonrpc\" requires url, database and username".into(),
            ));
        }

        Ok(())
    }

    /// A primary credential is present.
    pub fn is_primary_configured(&self) -> bool {
        self.primary.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// A legacy endpoint is present.
    pub fn is_legacy_configured(&self) -> bool {
        self.legacy
            .service_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn check_url(field: &str, url: Option<&String>) -> Result<(), ConfigError> {
    match url {
        Some(u) if !(u.starts_with("http://") || u.starts_with("https://")) => Err(
            ConfigError::ValidationError(format!("{field} must start with http:// or https://")),
        ),
        _ => Ok(()),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
