//! `erpilot probe`: test the configured AI backends.

use erpilot_config::AppConfig;
use erpilot_providers::{ConnectionProbe, ProbeStatus, ProviderCheck, check_connections};

fn print_check(label: &str, check: &ProviderCheck) {
    let Some(outcome) = &check.outcome else {
        println!("  ⚪ {label:<8} not configured");
        return;
    };

    match outcome.status {
        ProbeStatus::Ok => println!(
            "  ✅ {label:<8} ok ({} ms): {}",
            outcome.elapsed_ms,
            outcome.response.as_deref().unwrap_or("")
        ),
        ProbeStatus::Timeout => {
            println!("  ❌ {label:<8} timed out after {} ms", outcome.elapsed_ms);
            println!("              The service did not answer in time; check the URL and try again.");
        }
        ProbeStatus::Failed => {
            println!(
                "  ❌ {label:<8} failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            if outcome.auth_failure {
                println!("              The API key was rejected; update it in your config.");
            }
        }
    }
}

pub async fn run(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut providers = erpilot_providers::build_from_config(config)
        .map_err(|e| format!("Failed to set up AI providers: {e}"))?;
    if !config.probe.include_legacy {
        providers.legacy = None;
    }

    let probe = ConnectionProbe::from_config(&config.probe);
    if !json {
        println!("Probing AI backends (deadline {}s)...", probe.timeout().as_secs());
    }
    let report = check_connections(&providers, &probe).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print_check("primary", &report.primary);
        print_check("legacy", &report.legacy);
        println!();
        println!("  {}", report.message);
    }

    if report.overall_success {
        Ok(())
    } else {
        Err(report.message.into())
    }
}
