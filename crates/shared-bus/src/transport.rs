//! # Message Transport
//!
//! The port every component uses to talk to the bus. Payloads are text:
//! plain JSON, or a signed/encrypted envelope.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Callback invoked with `(address, message)` for each matching publication.
///
/// Handlers run on the publishing thread and must not block for long.
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Handle returned by [`MessageTransport::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish address is empty or contains wildcards.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Subscription pattern is malformed.
    #[error("Invalid subscription pattern: {0}")]
    InvalidPattern(String),

    /// The underlying connection is unavailable.
    #[error("Transport disconnected")]
    Disconnected,
}

/// Publish/subscribe transport.
pub trait MessageTransport: Send + Sync {
    /// Publish a message.
    ///
    /// A retained message replaces the previous retained message on the same
    /// address and is delivered to later subscribers. An empty retained
    /// message clears it.
    ///
    /// Returns the number of handlers that received the message.
    fn publish(&self, address: &str, message: &str, retained: bool) -> Result<usize, BusError>;

    /// Subscribe a handler to a pattern with `+`/`#` wildcards.
    fn subscribe(&self, pattern: &str, handler: MessageHandler)
        -> Result<SubscriptionId, BusError>;

    /// Remove a subscription. Returns false if it was not active.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
