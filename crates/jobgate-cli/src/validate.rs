use colored::Colorize;
use jobgate_engine::SeedData;
use jobgate_server::envelope::{RequestEnvelope, ResponseEnvelope, handle_event};
use jobgate_server::{AppState, ServerConfig};
use serde_json::Value;
use std::path::Path;

/// Read a submission file as an event envelope. A bare submission document
/// is wrapped as the envelope body.
pub fn read_envelope(path: &Path) -> anyhow::Result<RequestEnvelope> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;

    if value.get("body").is_some() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(RequestEnvelope {
            body: value,
            version: None,
        })
    }
}

/// Run one submission against in-memory stores built from `seed`. Returns
/// whether the job was accepted.
pub async fn validate_file(
    submission: &Path,
    seed: &Path,
    config: &ServerConfig,
    json: bool,
) -> anyhow::Result<bool> {
    let config = ServerConfig {
        seed_path: Some(seed.to_path_buf()),
        ..config.clone()
    };
    let state = AppState::from_config(&config)?;
    let envelope = read_envelope(submission)?;

    let response = handle_event(&state.engine, &envelope).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(submission, &response);
    }

    Ok(response.status().is_success())
}

fn print_response(path: &Path, response: &ResponseEnvelope) {
    let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);

    if response.status().is_success() {
        println!("{} {}", "✓".green().bold(), path.display());
        if let Some(job_id) = body.get("job_id").and_then(Value::as_str) {
            println!("  job_id: {}", job_id);
        }
        return;
    }

    println!(
        "{} {} ({})",
        "✗".red().bold(),
        path.display(),
        response.status_code
    );
    match body.get("errorMessage") {
        Some(Value::Array(messages)) => {
            for message in messages.iter().filter_map(Value::as_str) {
                println!("  {} {}", "error:".red(), message);
            }
        }
        Some(Value::String(message)) => println!("  {} {}", "error:".red(), message),
        _ => println!("  {} {}", "error:".red(), response.body),
    }
}

pub fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = ServerConfig::load(path)?.with_env_overrides()?;

    println!("{} {}", "✓".green().bold(), path.display());
    println!("  listen_address: {}", config.listen_address);
    println!("  log filter: {}", config.log.filter);
    println!(
        "  scheduling: {}s past tolerance, {} day horizon",
        config.scheduling.past_tolerance_secs, config.scheduling.future_horizon_days
    );

    if let Some(seed_path) = &config.seed_path {
        let seed = SeedData::load(seed_path)?;
        println!(
            "  seed: {} workflows, {} inventory records, {} jobs, {} instances",
            seed.workflows.len(),
            seed.inventory.len(),
            seed.jobs.len(),
            seed.instances.len()
        );
    }

    Ok(())
}
