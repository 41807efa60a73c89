//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration of a publisher process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error or an
    /// `EnvFilter` expression)
    pub log_level: String,

    /// Whether to write logs to the console at all
    pub console_output: bool,

    /// Whether to write JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "iotd-publisher".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IOTD_SERVICE_NAME`: Service name (default: iotd-publisher)
    /// - `IOTD_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `IOTD_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `IOTD_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TelemetryConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();

        Self {
            service_name: lookup("IOTD_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("IOTD_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("IOTD_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            json_logs: lookup("IOTD_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Configuration for a named publisher.
    pub fn for_publisher(publisher_id: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("iotd-{publisher_id}");
        config
    }
}
