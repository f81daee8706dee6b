use anyhow::Context;
use dashboard_gate::{config::GateConfig, init_gate, init_tracing};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    init_tracing(json_logs);

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/gate.yaml".to_string());

    let config = GateConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_gate(config).await.context("Gate error")?;

    Ok(())
}
