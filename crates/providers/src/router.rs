//! Provider set: the (at most two) backends a deployment has configured.

use crate::legacy::LegacyProvider;
use crate::openai::OpenAiProvider;
use erpilot_core::error::ProviderError;
use erpilot_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// The configured backends. Either may be absent.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub primary: Option<Arc<dyn Provider>>,
    pub legacy: Option<Arc<dyn Provider>>,
}

impl ProviderSet {
    pub fn new(primary: Option<Arc<dyn Provider>>, legacy: Option<Arc<dyn Provider>>) -> Self {
        Self { primary, legacy }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.legacy.is_none()
    }

    /// Identity tags of the configured backends, primary first.
    pub fn names(&self) -> Vec<&str> {
        self.primary
            .iter()
            .chain(self.legacy.iter())
            .map(|p| p.name())
            .collect()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("legacy", &self.legacy.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Build providers from configuration.
///
/// A backend is only built when its credential or endpoint is present, so an
/// empty set means "nothing configured".
pub fn build_from_config(
    config: &erpilot_config::AppConfig,
) -> Result<ProviderSet, ProviderError> {
    let primary: Option<Arc<dyn Provider>> = if config.is_primary_configured() {
        Some(Arc::new(OpenAiProvider::from_config(&config.primary)?))
    } else {
        None
    };

    let legacy: Option<Arc<dyn Provider>> = if config.is_legacy_configured() {
        Some(Arc::new(LegacyProvider::from_config(&config.legacy)?))
    } else {
        None
    };

    let set = ProviderSet::new(primary, legacy);
    info!(providers = ?set.names(), "Providers configured");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpilot_config::AppConfig;

    #[test]
    fn empty_config_builds_nothing() {
        let set = build_from_config(&AppConfig::default()).unwrap();
        assert!(set.is_empty());
        assert!(set.names().is_empty());
    }

    #[test]
    fn primary_only() {
        let mut config = AppConfig::default();
        config.primary.api_key = Some("sk-test".into());
        let set = build_from_config(&config).unwrap();
        assert_eq!(set.names(), vec!["openai"]);
        assert!(set.legacy.is_none());
    }

    #[test]
    fn both_backends_primary_first() {
        let mut config = AppConfig::default();
        config.primary.api_key = Some("sk-test".into());
        config.legacy.service_url = Some("http://localhost:8001".into());
        let set = build_from_config(&config).unwrap();
        assert_eq!(set.names(), vec!["openai", "legacy"]);
        assert!(!set.legacy.as_ref().unwrap().supports_tools());
    }

    #[test]
    fn debug_shows_names_only() {
        let mut config = AppConfig::default();
        config.legacy.service_url = Some("http://localhost:8001".into());
        let set = build_from_config(&config).unwrap();
        let dbg = format!("{set:?}");
        assert!(dbg.contains("legacy"));
        assert!(dbg.contains("primary: None"));
    }
}
