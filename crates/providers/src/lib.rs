//! LLM provider implementations for erpilot.
//!
//! Both backends implement the `erpilot_core::Provider` trait:
//! the OpenAI-compatible chat completions API (primary, tool-capable) and
//! the legacy chat microservice (text only). [`build_from_config`] decides
//! which of them exist for a deployment, and [`ConnectionProbe`] checks that
//! they answer.

pub mod legacy;
pub mod openai;
pub mod probe;
pub mod router;

#[cfg(test)]
mod test_server;

pub use legacy::LegacyProvider;
pub use openai::OpenAiProvider;
pub use probe::{ConnectionProbe, ConnectionReport, ProbeOutcome, ProbeStatus, ProviderCheck, check_connections};
pub use router::{ProviderSet, build_from_config};
