//! # Policy Engine
//!
//! Entry point of the policy engine process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load configuration from `PE_*` environment variables and validate it
//! 3. Build the service container
//! 4. Start background loops and the request broker
//! 5. Wait for Ctrl-C, then shut down

use anyhow::{Context, Result};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use policy_runtime::{EngineConfig, PolicyRuntime};
use policy_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    if let Err(e) = init_telemetry(&telemetry) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        warn!("Telemetry init failed ({e}), using plain logging");
    }

    let config = EngineConfig::from_env().context("invalid configuration")?;
    config.validate().context("invalid configuration")?;

    let runtime = PolicyRuntime::new(config)?;
    let _broker = runtime.start()?;
    info!("Policy engine is running. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    runtime.shutdown().await;
    Ok(())
}
