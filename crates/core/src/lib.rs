//! # erpilot Core
//!
//! Domain types, traits, and error definitions for the erpilot chat agent.
//! This crate has **no I/O**: it defines the model that the provider, tool
//! and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here: [`Provider`] for upstream language models and
//! [`Tool`] for business capabilities. Implementations live in their own
//! crates.

pub mod error;
pub mod executor;
pub mod message;
pub mod provider;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError, ValidationError};
pub use executor::ToolExecutor;
pub use message::{Message, Role, ToolCallRequest, validate_history};
pub use provider::{Provider, ProviderOutcome, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage};
pub use tool::{FnTool, ParamType, Tool, ToolArgs, ToolParameter, ToolRegistry, ToolResult, ToolSchema};
pub use turn::{AgentTurnResult, ChatRequest, ToolCallRecord, TurnError};
