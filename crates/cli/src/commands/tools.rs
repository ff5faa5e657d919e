//! `erpilot tools`: list the tool catalog.

use erpilot_config::AppConfig;

pub fn run(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let backend = erpilot_tools::backend_from_config(&config.backend)
        .map_err(|e| format!("Failed to set up data backend: {e}"))?;
    let registry = erpilot_tools::default_registry(backend);

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
        return Ok(());
    }

    println!("Available tools ({}):", registry.len());
    for schema in registry.describe_all() {
        println!();
        println!("  {}", schema.name);
        println!("    {}", schema.description);
        for p in &schema.parameters {
            let required = if p.required { "required" } else { "optional" };
            println!(
                "    - {} ({}, {required}): {}",
                p.name,
                serde_json::to_value(p.kind)?.as_str().unwrap_or_default(),
                p.description
            );
        }
    }

    Ok(())
}
