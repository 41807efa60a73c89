//! # Error Types
//!
//! Defines error types shared by the registries and command ingestors.

use thiserror::Error;

/// Errors reported by registry lookups and updates.
///
/// None of these leave the registry modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Unknown device, node, input or configuration key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored value does not parse as the requested type.
    #[error("Node '{hw_id}' configuration '{attr}' is not a {expected}: {value}")]
    ValueFormat {
        hw_id: String,
        attr: String,
        expected: &'static str,
        value: String,
    },
}

/// Reasons a single inbound message is rejected.
///
/// Each rejection is scoped to its message; shared state stays untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Malformed address, envelope or payload.
    #[error("Decode failure for '{address}': {reason}")]
    DecodeFailure { address: String, reason: String },

    /// Required signing or encryption is absent.
    #[error("Policy violation for '{address}': {reason}")]
    PolicyViolation { address: String, reason: String },

    /// Target node or input is not registered.
    #[error("Unknown target '{address}'")]
    NotFound { address: String },

    /// Timestamp is not newer than the last accepted one from this sender.
    #[error("Replay rejected for '{address}' from sender '{sender}'")]
    ReplayRejected { address: String, sender: String },

    /// Identity is not countersigned by the DSS.
    #[error("Identity for '{address}' is not DSS-countersigned")]
    TrustRejected { address: String },
}

impl CommandError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DecodeFailure { .. } => "decode_failure",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::NotFound { .. } => "not_found",
            Self::ReplayRejected { .. } => "replay_rejected",
            Self::TrustRejected { .. } => "trust_rejected",
        }
    }
}
