//! # Command Payloads
//!
//! Payloads of the commands a publisher accepts from the bus.
//!
//! ## Delivery Rules
//!
//! - Every command is signed by its sender, then encrypted to the publisher.
//! - `sender` is the sender's identity address; its signing key is looked up
//!   in the publisher directory.
//! - Plaintext or unsigned delivery is rejected regardless of content.

use crate::entities::NodeAttrMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to change a node's configuration values.
/// Address: `domain/publisher/nodeID/$configure`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfigureMessage {
    /// Identity address of the sender.
    pub sender: String,
    /// Time the command was created.
    pub timestamp: DateTime<Utc>,
    /// Configuration values to apply.
    pub attr: NodeAttrMap,
}

/// Request to change an input's value.
/// Address: `domain/publisher/nodeID/inputType/instance/$set`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInputMessage {
    /// Identity address of the sender.
    pub sender: String,
    /// Time the command was created. Must increase per sender.
    pub timestamp: DateTime<Utc>,
    /// New input value.
    pub value: String,
}
