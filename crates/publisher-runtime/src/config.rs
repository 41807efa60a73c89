//! # Publisher Configuration
//!
//! Runtime parameters of a publisher, from defaults, a TOML file or the
//! environment.
//!
//! ```toml
//! domain = "home"
//! publisher_id = "zwave"
//! nodes_file = "/var/lib/iotd/zwave-nodes.json"
//! require_signed_identity = true
//! publish_interval_ms = 1000
//! save_on_update = true
//! max_future_skew_secs = 30
//! ```

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Characters with a meaning in bus addresses.
const RESERVED: &[char] = &['/', '+', '#', '$'];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file '{path}' is not valid TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete publisher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    /// Domain the publisher belongs to.
    pub domain: String,
    /// Publisher ID, unique in the domain.
    pub publisher_id: String,
    /// Node list file. Loaded on start and saved after updates.
    pub nodes_file: Option<PathBuf>,
    /// Only accept identity announcements in a signed envelope.
    pub require_signed_identity: bool,
    /// Interval of the discovery publication loop.
    pub publish_interval_ms: u64,
    /// Save the node list whenever node updates are published.
    pub save_on_update: bool,
    /// Reject set commands timestamped further than this in the future.
    pub max_future_skew_secs: Option<u64>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            domain: "local".to_string(),
            publisher_id: "publisher".to_string(),
            nodes_file: None,
            require_signed_identity: false,
            publish_interval_ms: 1000,
            save_on_update: true,
            max_future_skew_secs: None,
        }
    }
}

impl PublisherConfig {
    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IOTD_DOMAIN`: Domain (default: local)
    /// - `IOTD_PUBLISHER_ID`: Publisher ID (default: publisher)
    /// - `IOTD_NODES_FILE`: Node list file (default: none)
    /// - `IOTD_REQUIRE_SIGNED_IDENTITY`: Require signed identities (default: false)
    /// - `IOTD_PUBLISH_INTERVAL_MS`: Publication interval (default: 1000)
    /// - `IOTD_SAVE_ON_UPDATE`: Save nodes after publishing (default: true)
    /// - `IOTD_MAX_FUTURE_SKEW_SECS`: Future timestamp bound for set
    ///   commands (default: unbounded)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Load a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `IOTD_*` overrides from a variable source.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(domain) = lookup("IOTD_DOMAIN") {
            self.domain = domain;
        }
        if let Some(publisher_id) = lookup("IOTD_PUBLISHER_ID") {
            self.publisher_id = publisher_id;
        }
        if let Some(path) = lookup("IOTD_NODES_FILE") {
            self.nodes_file = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Some(value) = lookup("IOTD_REQUIRE_SIGNED_IDENTITY") {
            self.require_signed_identity = parse_flag("IOTD_REQUIRE_SIGNED_IDENTITY", &value)?;
        }
        if let Some(value) = lookup("IOTD_PUBLISH_INTERVAL_MS") {
            self.publish_interval_ms = parse_value("IOTD_PUBLISH_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("IOTD_SAVE_ON_UPDATE") {
            self.save_on_update = parse_flag("IOTD_SAVE_ON_UPDATE", &value)?;
        }
        if let Some(value) = lookup("IOTD_MAX_FUTURE_SKEW_SECS") {
            self.max_future_skew_secs = Some(parse_value("IOTD_MAX_FUTURE_SKEW_SECS", &value)?);
        }
        Ok(self)
    }

    /// Check the configuration can form valid bus addresses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_segment("domain", &self.domain)?;
        check_segment("publisher_id", &self.publisher_id)?;
        if self.publish_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "publish_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn check_segment(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{name} is empty")));
    }
    if value.contains(RESERVED) {
        return Err(ConfigError::Invalid(format!(
            "{name} '{value}' contains one of {RESERVED:?}"
        )));
    }
    Ok(())
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
