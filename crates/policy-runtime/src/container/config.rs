//! # Engine Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//! Defaults are usable as-is; `PE_*` environment variables override them.

use pe_02_task_dispatcher::{DispatcherConfig, DEFAULT_MAX_ATTEMPTS};
use pe_03_mint_orchestrator::{MintConfig, DEFAULT_CHUNK_SIZE};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Upper bound accepted for `PE_MAX_TASK_ATTEMPTS`.
const MAX_ATTEMPTS_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub dispatcher: DispatcherSettings,
    pub mint: MintSettings,
    pub broker: BrokerSettings,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("{key} is out of range: {message}")]
    OutOfRange {
        key: &'static str,
        message: String,
    },
}

/// Worker task dispatch.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Attempt budget for retryable tasks.
    pub max_task_attempts: u32,
    /// Pending tasks older than this are evicted.
    pub task_timeout_secs: u64,
    pub eviction_interval_secs: u64,
    /// Ledger network injected into task payloads.
    pub ledger_network: Option<String>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_task_attempts: DEFAULT_MAX_ATTEMPTS,
            task_timeout_secs: 600,
            eviction_interval_secs: 30,
            ledger_network: Some("testnet".to_string()),
        }
    }
}

impl DispatcherSettings {
    #[must_use]
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_attempts: self.max_task_attempts,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            network: self.ledger_network.clone(),
        }
    }

    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

/// Token settlement.
#[derive(Debug, Clone)]
pub struct MintSettings {
    /// Serials per mint or transfer task.
    pub chunk_size: usize,
    pub priority: u8,
    /// Attempt budget per ledger task; 0 uses the dispatcher budget.
    pub attempts: u32,
    /// Serials a single non-fungible mint may request.
    pub max_nft_amount: u64,
}

impl Default for MintSettings {
    fn default() -> Self {
        let defaults = MintConfig::default();
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            priority: defaults.priority,
            attempts: defaults.attempts,
            max_nft_amount: defaults.max_nft_amount,
        }
    }
}

impl MintSettings {
    #[must_use]
    pub fn to_mint_config(&self) -> MintConfig {
        MintConfig {
            chunk_size: self.chunk_size,
            priority: self.priority,
            attempts: self.attempts,
            max_nft_amount: self.max_nft_amount,
        }
    }
}

/// Event bus and request intake.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Events buffered per bus subscriber.
    pub bus_capacity: usize,
    /// Requests buffered before callers wait.
    pub request_queue: usize,
    /// Name used as `sender` on response envelopes.
    pub service_name: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            bus_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            request_queue: 256,
            service_name: "policy-engine".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Materialize policies in dry-run mode (throwaway keys, no real ledger).
    pub dry_run: bool,
    /// Answer worker tasks in-process.
    pub embedded_worker: bool,
    pub metrics_interval_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            embedded_worker: true,
            metrics_interval_secs: 15,
        }
    }
}

impl RuntimeSettings {
    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}

impl EngineConfig {
    /// Defaults overridden by `PE_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PE_MAX_TASK_ATTEMPTS`, `PE_TASK_TIMEOUT_SECS`, `PE_EVICTION_INTERVAL_SECS`
    /// - `PE_LEDGER_NETWORK`
    /// - `PE_MINT_CHUNK_SIZE`, `PE_MINT_PRIORITY`, `PE_MINT_ATTEMPTS`, `PE_MAX_NFT_AMOUNT`
    /// - `PE_BUS_CAPACITY`, `PE_REQUEST_QUEUE`, `PE_SERVICE_NAME`
    /// - `PE_DRY_RUN`, `PE_EMBEDDED_WORKER`, `PE_METRICS_INTERVAL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let d = &mut config.dispatcher;
        override_parsed(&lookup, "PE_MAX_TASK_ATTEMPTS", &mut d.max_task_attempts)?;
        override_parsed(&lookup, "PE_TASK_TIMEOUT_SECS", &mut d.task_timeout_secs)?;
        override_parsed(&lookup, "PE_EVICTION_INTERVAL_SECS", &mut d.eviction_interval_secs)?;
        if let Some(network) = lookup("PE_LEDGER_NETWORK") {
            d.ledger_network = Some(network).filter(|n| !n.trim().is_empty());
        }

        let m = &mut config.mint;
        override_parsed(&lookup, "PE_MINT_CHUNK_SIZE", &mut m.chunk_size)?;
        override_parsed(&lookup, "PE_MINT_PRIORITY", &mut m.priority)?;
        override_parsed(&lookup, "PE_MINT_ATTEMPTS", &mut m.attempts)?;
        override_parsed(&lookup, "PE_MAX_NFT_AMOUNT", &mut m.max_nft_amount)?;

        let b = &mut config.broker;
        override_parsed(&lookup, "PE_BUS_CAPACITY", &mut b.bus_capacity)?;
        override_parsed(&lookup, "PE_REQUEST_QUEUE", &mut b.request_queue)?;
        if let Some(name) = lookup("PE_SERVICE_NAME") {
            b.service_name = name;
        }

        let r = &mut config.runtime;
        override_flag(&lookup, "PE_DRY_RUN", &mut r.dry_run)?;
        override_flag(&lookup, "PE_EMBEDDED_WORKER", &mut r.embedded_worker)?;
        override_parsed(&lookup, "PE_METRICS_INTERVAL_SECS", &mut r.metrics_interval_secs)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dispatcher;
        non_zero("PE_MAX_TASK_ATTEMPTS", u64::from(d.max_task_attempts))?;
        if d.max_task_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::OutOfRange {
                key: "PE_MAX_TASK_ATTEMPTS",
                message: format!("at most {MAX_ATTEMPTS_LIMIT}"),
            });
        }
        non_zero("PE_TASK_TIMEOUT_SECS", d.task_timeout_secs)?;
        non_zero("PE_EVICTION_INTERVAL_SECS", d.eviction_interval_secs)?;
        if d.eviction_interval_secs > d.task_timeout_secs {
            return Err(ConfigError::OutOfRange {
                key: "PE_EVICTION_INTERVAL_SECS",
                message: "must not exceed PE_TASK_TIMEOUT_SECS".to_string(),
            });
        }

        non_zero("PE_MINT_CHUNK_SIZE", self.mint.chunk_size as u64)?;
        non_zero("PE_MAX_NFT_AMOUNT", self.mint.max_nft_amount)?;
        if self.mint.attempts > d.max_task_attempts {
            return Err(ConfigError::OutOfRange {
                key: "PE_MINT_ATTEMPTS",
                message: "must not exceed PE_MAX_TASK_ATTEMPTS".to_string(),
            });
        }

        non_zero("PE_BUS_CAPACITY", self.broker.bus_capacity as u64)?;
        non_zero("PE_REQUEST_QUEUE", self.broker.request_queue as u64)?;
        non_zero("PE_METRICS_INTERVAL_SECS", self.runtime.metrics_interval_secs)?;
        Ok(())
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw })?;
    }
    Ok(())
}

fn override_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut bool,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => return Err(ConfigError::InvalidValue { key, value: raw }),
        };
    }
    Ok(())
}

fn non_zero(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { key })
    } else {
        Ok(())
    }
}
