//! # Node Construction and Config Values
//!
//! Pure helpers used by the registry: building a fresh node with the
//! standard configuration, and parsing configuration values.

use chrono::Utc;
use shared_types::address;
use shared_types::entities::{attr, ConfigAttr, DataType, Node, NodeConfigMap};
use shared_types::RegistryError;
use std::collections::HashMap;
use tracing::error;

/// Standard configuration every new node starts with.
#[must_use]
pub fn default_config() -> NodeConfigMap {
    let mut config = NodeConfigMap::new();
    config.insert(
        attr::NAME.to_string(),
        ConfigAttr::new(DataType::String, "Human friendly node name", ""),
    );
    config.insert(
        attr::PUBLISH_EVENT.to_string(),
        ConfigAttr::new(DataType::Bool, "Enable publishing outputs as event", "false"),
    );
    config.insert(
        attr::PUBLISH_HISTORY.to_string(),
        ConfigAttr::new(DataType::Bool, "Enable publishing output history", "true"),
    );
    config.insert(
        attr::PUBLISH_LATEST.to_string(),
        ConfigAttr::new(DataType::Bool, "Enable publishing latest output", "true"),
    );
    config.insert(
        attr::PUBLISH_RAW.to_string(),
        ConfigAttr::new(DataType::Bool, "Enable publishing raw outputs", "true"),
    );
    config
}

/// Build a new node for a device or service.
///
/// Returns `None` (and logs) when any argument is empty or the hardware ID,
/// which becomes the initial node ID, is not a valid address segment.
#[must_use]
pub fn new_node(domain: &str, publisher_id: &str, hw_id: &str, node_type: &str) -> Option<Node> {
    if domain.is_empty() || publisher_id.is_empty() || hw_id.is_empty() || node_type.is_empty() {
        error!(
            domain = domain,
            publisher_id = publisher_id,
            hw_id = hw_id,
            node_type = node_type,
            "Refusing to create node with empty argument"
        );
        return None;
    }
    if !address::is_valid_segment(hw_id) {
        error!(hw_id = hw_id, "Hardware ID cannot be used as an address segment");
        return None;
    }

    let mut attrs = HashMap::new();
    attrs.insert(attr::TYPE.to_string(), node_type.to_string());

    Some(Node {
        address: address::make_node_discovery_address(domain, publisher_id, hw_id),
        hw_id: hw_id.to_string(),
        node_id: hw_id.to_string(),
        publisher_id: publisher_id.to_string(),
        attr: attrs,
        config: default_config(),
        status: HashMap::new(),
        timestamp: Utc::now(),
    })
}

/// A configuration value together with the error that forced a fallback.
///
/// `value` is always usable: on error it holds the caller's default.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub error: Option<RegistryError>,
}

impl<T> ConfigValue<T> {
    pub(crate) fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    pub(crate) fn fallback(value: T, error: RegistryError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    /// True when no fallback was needed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, discarding the fallback value on error.
    pub fn into_result(self) -> Result<T, RegistryError> {
        match self.error {
            None => Ok(self.value),
            Some(e) => Err(e),
        }
    }
}

/// Parse a boolean the way configuration values are written:
/// `1 t T TRUE true True` and `0 f F FALSE false False`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
