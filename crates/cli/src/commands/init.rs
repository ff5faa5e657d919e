//! `erpilot init`: write a default config file.

use erpilot_config::AppConfig;
use std::path::PathBuf;

pub fn run(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path.unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually, or re-run with --force to overwrite.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;

    println!("Created config at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set primary.api_key (or export OPENAI_API_KEY)");
    println!("     and/or legacy.service_url for the legacy AI service");
    println!("  2. Run: erpilot probe");
    println!("  3. Run: erpilot chat");

    Ok(())
}
