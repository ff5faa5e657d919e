//! `erpilot chat`: interactive or single-message chat mode.

use erpilot_agent::FallbackCoordinator;
use erpilot_config::AppConfig;
use erpilot_core::message::Message;
use erpilot_core::turn::{AgentTurnResult, ChatRequest};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::remediation;

fn build_coordinator(config: &AppConfig) -> Result<FallbackCoordinator, Box<dyn std::error::Error>> {
    let providers = erpilot_providers::build_from_config(config)
        .map_err(|e| format!("Failed to set up AI providers: {e}"))?;
    let backend = erpilot_tools::backend_from_config(&config.backend)
        .map_err(|e| format!("Failed to set up data backend: {e}"))?;
    let registry = Arc::new(erpilot_tools::default_registry(backend));
    Ok(FallbackCoordinator::from_config(config, providers, registry))
}

/// Print one turn's outcome. Returns whether it succeeded.
fn print_result(result: &AgentTurnResult) -> bool {
    for call in &result.tool_calls_made {
        let failed = if call.result.get("error").is_some() { " (error)" } else { "" };
        eprintln!("  [tool] {}({}){failed}", call.tool_name, call.arguments);
    }

    if result.success {
        for line in result.response.lines() {
            println!("  Assistant > {line}");
        }
        if result.max_iterations_reached {
            eprintln!("  [note] tool round limit reached; the answer may be incomplete");
        }
        return true;
    }

    eprintln!("  [Error] {}", result.response);
    if let Some(error) = &result.error {
        eprintln!("  {}", remediation(error));
    }
    false
}

pub async fn run(config: &AppConfig, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator(config)?;

    // Give setup instructions before the first turn, not after it fails
    if !coordinator.is_configured() {
        eprintln!();
        eprintln!("  ERROR: No AI backend configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY       = 'sk-...'   (primary provider)");
        eprintln!("    ERPILOT_SERVICE_URL  = 'http://...' (legacy AI service)");
        eprintln!();
        eprintln!("  Or add them to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No AI backend configured. See above for setup instructions.".into());
    }

    if let Some(msg) = message {
        let result = coordinator.handle_chat(ChatRequest::new(msg)).await;
        if !print_result(&result) {
            return Err("Chat turn failed".into());
        }
        return Ok(());
    }

    println!();
    println!("  erpilot: interactive mode");
    println!();
    println!("  Model:     {}", config.primary.model);
    println!("  Backend:   {:?}", config.backend.kind);
    println!("  Rounds:    {}", config.agent.max_rounds);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let request = ChatRequest::new(line).with_history(history.clone());
        let result = coordinator.handle_chat(request).await;
        println!();
        if print_result(&result) {
            // Failed turns leave the history untouched so the user can retry
            history.extend(result.messages);
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
