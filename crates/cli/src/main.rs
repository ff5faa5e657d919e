//! erpilot CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write a default config file
//! - `chat`: Interactive chat or single-message mode
//! - `probe`: Test the configured AI backends
//! - `tools`: List the tools the assistant can call

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "erpilot",
    about = "erpilot: a tool-calling assistant for sales, inventory and CRM data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.erpilot/config.toml
    #[arg(short, long, global = true, env = "ERPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Check that the configured AI backends answer
    Probe {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the available tools
    Tools {
        /// Print the provider-facing catalog as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(cli.config, force)?,
        Commands::Chat { message } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::chat::run(&config, message).await?
        }
        Commands::Probe { json } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::probe::run(&config, json).await?
        }
        Commands::Tools { json } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::tools::run(&config, json)?
        }
    }

    Ok(())
}
