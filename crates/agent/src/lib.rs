//! The agent loop and provider fallback.
//!
//! A turn follows a **call → act → observe** cycle:
//!
//! 1. **Seed** the conversation with the system preamble when it is new
//! 2. **Send** it to the provider with the tool catalog
//! 3. **If tool calls**: execute them in order, append the results, go to 2
//! 4. **If text**: that is the answer
//!
//! After `max_rounds` tool rounds one last call is made with no tools
//! offered, so every turn ends in text. [`FallbackCoordinator`] wraps the
//! loop and retries a failed turn once on the legacy backend.

pub mod coordinator;
pub mod loop_runner;
pub mod prompt;

#[cfg(test)]
mod test_helpers;

pub use coordinator::{FallbackCoordinator, NOT_CONFIGURED_MESSAGE};
pub use loop_runner::{AgentLoop, BUDGET_EXHAUSTED_MESSAGE, DEFAULT_MAX_ROUNDS, LoopFailure, LoopOutcome};
pub use prompt::DEFAULT_SYSTEM_PROMPT;
