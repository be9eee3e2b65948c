//! # Policy Telemetry
//!
//! Logging and metrics shared by every policy engine crate.
//!
//! - **Logs**: `tracing` events through a `tracing-subscriber` registry with
//!   an `EnvFilter` and a pretty or JSON formatter.
//! - **Metrics**: a Prometheus registry of `pe_*` series, rendered with
//!   [`encode_metrics`].
//!
//! ```rust,ignore
//! let config = TelemetryConfig::from_env();
//! policy_telemetry::init_telemetry(&config)?;
//! ```

pub mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use metrics::{
    encode_metrics, fanout_timer, record_mint_chunks, record_task_counts, register_metrics,
    task_outcome, HistogramTimer,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Install the log subscriber and register metrics.
///
/// Fails if a global subscriber is already set; callers may fall back to a
/// plain formatter.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_setup::init_tracing(config)?;
    register_metrics()?;
    tracing::info!(
        service = %config.service_name,
        format = ?config.format,
        "[telemetry] initialized"
    );
    Ok(())
}
