//! # Core Domain Entities
//!
//! Defines the discovery entities a publisher owns and announces on the bus.
//!
//! ## Clusters
//!
//! - **Nodes**: `NodeDiscoveryMessage`, `ConfigAttr`, attribute/status keys
//! - **Inputs**: `InputDiscoveryMessage`
//! - **Publishers**: `PublisherIdentity`, `PublisherIdentityMessage`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address;

// =============================================================================
// CLUSTER A: NODES
// =============================================================================

/// Attribute name used in `attr` and `config` maps.
pub type NodeAttr = String;

/// Status name used in the `status` map.
pub type NodeStatus = String;

/// Attribute name → value map.
pub type NodeAttrMap = HashMap<NodeAttr, String>;

/// Status name → value map.
pub type NodeStatusMap = HashMap<NodeStatus, String>;

/// Configuration descriptors by attribute name.
pub type NodeConfigMap = HashMap<NodeAttr, ConfigAttr>;

/// Standard attribute keys.
pub mod attr {
    /// Node type, set on creation.
    pub const TYPE: &str = "type";
    /// Human friendly node name.
    pub const NAME: &str = "name";
    /// Enable publishing outputs as event.
    pub const PUBLISH_EVENT: &str = "publishEvent";
    /// Enable publishing output history.
    pub const PUBLISH_HISTORY: &str = "publishHistory";
    /// Enable publishing latest output.
    pub const PUBLISH_LATEST: &str = "publishLatest";
    /// Enable publishing raw outputs.
    pub const PUBLISH_RAW: &str = "publishRaw";
    /// Firmware version reported by the device.
    pub const FIRMWARE_VERSION: &str = "firmwareVersion";
    /// Device manufacturer.
    pub const MANUFACTURER: &str = "manufacturer";
}

/// Standard status keys.
pub mod status {
    /// Current run state, see [`super::RunState`].
    pub const RUN_STATE: &str = "runState";
    /// Last error message, empty when cleared.
    pub const LAST_ERROR: &str = "lastError";
    /// Time the node was last seen.
    pub const LAST_SEEN: &str = "lastSeen";
}

/// Node run states stored under [`status::RUN_STATE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Ready,
    Error,
    Disconnected,
    Failed,
    Sleeping,
}

impl RunState {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Sleeping => "sleeping",
        }
    }
}

/// Data type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Enum,
    Int,
    Number,
    #[default]
    String,
    Bytes,
    Json,
    List,
}

/// Type of device or service a node represents.
///
/// Kept as a free-form string; publishers define their own types.
pub type NodeType = String;

/// Describes a remotely configurable attribute.
///
/// Value type: replaced wholesale in a node's config map, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigAttr {
    /// Data type of the value.
    #[serde(rename = "datatype", default)]
    pub data_type: DataType,
    /// Description for humans.
    #[serde(default)]
    pub description: String,
    /// Value used when no attribute value is set.
    #[serde(rename = "default", default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,
}

impl ConfigAttr {
    /// Create a configuration descriptor.
    pub fn new(data_type: DataType, description: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            data_type,
            description: description.into(),
            default_value: default_value.into(),
        }
    }
}

/// A device or service registered by a publisher.
///
/// Instances are immutable once registered: the registry shares them as
/// `Arc<NodeDiscoveryMessage>` and every change produces a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDiscoveryMessage {
    /// Discovery address: `domain/publisher/nodeID/$node`.
    #[serde(default)]
    pub address: String,
    /// Hardware bound identifier. Never changes.
    #[serde(rename = "hwID")]
    pub hw_id: String,
    /// Publication identifier, defaults to `hw_id`.
    #[serde(rename = "nodeID", default)]
    pub node_id: String,
    /// Publisher that owns this node.
    #[serde(rename = "publisherID", default)]
    pub publisher_id: String,
    /// Discovered attribute values.
    #[serde(default)]
    pub attr: NodeAttrMap,
    /// Configurable attributes.
    #[serde(default)]
    pub config: NodeConfigMap,
    /// Status values.
    #[serde(default)]
    pub status: NodeStatusMap,
    /// Time of the last change.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl NodeDiscoveryMessage {
    /// Domain the node lives in, taken from its address.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        address::split_address(&self.address).map(|parts| parts.domain)
    }

    /// Attribute value, if set.
    #[must_use]
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attr.get(name).map(String::as_str)
    }
}

/// Shorter name used throughout the registry code.
pub type Node = NodeDiscoveryMessage;

// =============================================================================
// CLUSTER B: INPUTS
// =============================================================================

/// Discovery record of a node input.
///
/// The handler invoked on a set command is kept by the input registry,
/// beside this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDiscoveryMessage {
    /// `domain/publisher/nodeID/inputType/instance/$input`
    pub address: String,
    #[serde(rename = "nodeID")]
    pub node_id: String,
    #[serde(rename = "publisherID")]
    pub publisher_id: String,
    pub input_type: String,
    pub instance: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// CLUSTER C: PUBLISHERS
// =============================================================================

/// Identity of a publisher as countersigned by the DSS.
///
/// Field order is part of the canonical serialization used for
/// countersignatures; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherIdentity {
    /// Identity address: `domain/publisher/$identity`.
    pub address: String,
    pub domain: String,
    #[serde(rename = "publisherId")]
    pub publisher_id: String,
    /// Base64url SEC1 compressed secp256k1 public key.
    pub public_signing_key: String,
    pub timestamp: DateTime<Utc>,
}

/// Identity announcement published on a `$identity` address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherIdentityMessage {
    #[serde(flatten)]
    pub identity: PublisherIdentity,
    /// DSS countersignature over the canonical identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_signature: Option<String>,
}

impl PublisherIdentityMessage {
    /// Announced identity address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.identity.address
    }
}
