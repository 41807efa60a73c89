//! # Node Configure Commands
//!
//! Receives `$configure` commands for the nodes of this publisher and applies
//! them to the registry.
//!
//! ## Security
//!
//! A command is applied only when it arrived encrypted to this publisher and
//! signed by a sender whose key is in the publisher directory. Decryption and
//! signature verification complete before the registry is touched.
//!
//! ## Flow
//!
//! ```text
//! dom/pub/+/$configure ──→ decode ──→ [encrypted? signed? valid?]
//!                                              │
//!                                   node by address (3rd segment)
//!                                              │
//!                                   NodeConfigureHandler filter
//!                                              │
//!                                   update_node_config_values(hw_id)
//! ```

use crate::domain::registry::RegisteredNodes;
use crate::ports::outbound::NodeConfigureHandler;
use parking_lot::{Mutex, RwLock};
use shared_bus::{BusError, MessageHandler, MessageTransport, SubscriptionId};
use shared_crypto::{DecodedMessage, MessageSigner};
use shared_types::address;
use shared_types::{CommandError, NodeConfigureMessage};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Ingestor of node configure commands.
pub struct ReceiveNodeConfigure {
    domain: String,
    publisher_id: String,
    signer: MessageSigner,
    registry: Arc<RegisteredNodes>,
    transport: Arc<dyn MessageTransport>,
    handler: RwLock<Option<Arc<dyn NodeConfigureHandler>>>,
    /// Active subscription. The lock serializes start/stop.
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ReceiveNodeConfigure {
    pub fn new(
        domain: impl Into<String>,
        publisher_id: impl Into<String>,
        handler: Option<Arc<dyn NodeConfigureHandler>>,
        signer: MessageSigner,
        registry: Arc<RegisteredNodes>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            domain: domain.into(),
            publisher_id: publisher_id.into(),
            signer,
            registry,
            transport,
            handler: RwLock::new(handler),
            subscription: Mutex::new(None),
        }
    }

    /// Replace the configuration filter. `None` passes everything through.
    pub fn set_configure_node_handler(&self, handler: Option<Arc<dyn NodeConfigureHandler>>) {
        *self.handler.write() = handler;
    }

    /// Subscribe to configure commands for all nodes of this publisher.
    ///
    /// Does nothing when already started.
    pub fn start(self: &Arc<Self>) -> Result<(), BusError> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }
        let pattern =
            address::make_node_configure_address(&self.domain, &self.publisher_id, address::WILDCARD);

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_message: MessageHandler = Arc::new(move |address: &str, message: &str| {
            if let Some(this) = weak.upgrade() {
                if let Err(e) = this.receive_configure_command(address, message) {
                    warn!(address = address, kind = e.kind(), error = %e, "Configure command rejected");
                }
            }
        });

        *subscription = Some(self.transport.subscribe(&pattern, on_message)?);
        info!(pattern = %pattern, "Listening for configure commands");
        Ok(())
    }

    /// Stop listening. Does nothing when not started.
    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.transport.unsubscribe(id);
            info!(publisher_id = %self.publisher_id, "Stopped listening for configure commands");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Decode a configure command and enforce the security policy.
    pub fn decode_configure_command(
        &self,
        address: &str,
        message: &str,
    ) -> Result<NodeConfigureMessage, CommandError> {
        let decoded: DecodedMessage<NodeConfigureMessage> = self.signer.decode_message(message);
        if !decoded.is_encrypted {
            return Err(CommandError::PolicyViolation {
                address: address.to_string(),
                reason: "configure command is not encrypted".into(),
            });
        }
        let command = decoded.payload.map_err(|e| CommandError::DecodeFailure {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if !decoded.is_signed {
            return Err(CommandError::PolicyViolation {
                address: address.to_string(),
                reason: "configure command is not signed".into(),
            });
        }
        Ok(command)
    }

    /// Handle one configure command.
    ///
    /// Returns whether the node changed.
    pub fn receive_configure_command(
        &self,
        address: &str,
        message: &str,
    ) -> Result<bool, CommandError> {
        let command = self.decode_configure_command(address, message)?;

        let node = self
            .registry
            .get_node_by_address(address)
            .ok_or_else(|| CommandError::NotFound {
                address: address.to_string(),
            })?;

        info!(
            address = address,
            sender = %command.sender,
            hw_id = %node.hw_id,
            "Configure command received"
        );

        let handler = self.handler.read().clone();
        let params = match handler {
            Some(handler) => handler.on_configure(address, command.attr),
            None => Some(command.attr),
        };
        let Some(params) = params else {
            debug!(address = address, "Configure command filtered out by handler");
            return Ok(false);
        };

        Ok(self.registry.update_node_config_values(&node.hw_id, &params))
    }
}
