//! Telemetry configuration from environment variables.

use std::env;

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Attached to every log line as `service`.
    pub service_name: String,

    /// Filter directive used when `RUST_LOG` is not set.
    pub log_level: String,

    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "policy-engine".to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PE_SERVICE_NAME`: Service name (default: policy-engine)
    /// - `PE_LOG_LEVEL`: Fallback filter when `RUST_LOG` is unset (default: info)
    /// - `PE_LOG_FORMAT`: `json` or `pretty` (default: pretty)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: env::var("PE_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env::var("PE_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("PE_LOG_FORMAT")
                .ok()
                .and_then(|raw| LogFormat::parse(&raw))
                .unwrap_or(defaults.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "policy-engine");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
