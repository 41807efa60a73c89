//! # Trust Chain
//!
//! Accepts publisher identity announcements from `domain/+/$identity` into
//! the publisher directory.
//!
//! ## Flow
//!
//! ```text
//! message ──→ [signed envelope?] ──→ payload ──→ PublisherIdentityMessage
//!                                                        │
//!                                    address matches topic?
//!                                                        │
//!               AddressProtectionOnly: accept    DssVerified: countersignature
//!                                                        │
//!                                  directory ←── (DSS address: state → DssVerified)
//! ```
//!
//! The envelope signature of an announcement is not verified: the key that
//! would verify it is the one being announced. Trust comes from address
//! protection or from the DSS countersignature.

use crate::domain::directory::DomainPublishers;
use crate::domain::trust::{verify_identity, TrustState};
use crate::ports::outbound::IdentityObserver;
use parking_lot::{Mutex, RwLock};
use shared_bus::{BusError, MessageHandler, MessageTransport, SubscriptionId};
use shared_crypto::{Secp256k1PublicKey, SignedEnvelope};
use shared_types::address;
use shared_types::entities::PublisherIdentityMessage;
use shared_types::CommandError;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Identity announcement verification and bookkeeping.
pub struct TrustChain {
    domain: String,
    require_signed: bool,
    directory: Arc<DomainPublishers>,
    transport: Arc<dyn MessageTransport>,
    /// Held while an identity is decided and stored.
    state: Mutex<TrustState>,
    observer: RwLock<Option<Arc<dyn IdentityObserver>>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl TrustChain {
    /// Create a chain without a DSS.
    ///
    /// With `require_signed` unsigned announcements are rejected.
    pub fn new(
        domain: impl Into<String>,
        require_signed: bool,
        directory: Arc<DomainPublishers>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            domain: domain.into(),
            require_signed,
            directory,
            transport,
            state: Mutex::new(TrustState::AddressProtectionOnly),
            observer: RwLock::new(None),
            subscription: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<DomainPublishers> {
        &self.directory
    }

    #[must_use]
    pub fn trust_state(&self) -> TrustState {
        *self.state.lock()
    }

    /// Observer of announcements received over the bus.
    pub fn set_observer(&self, observer: Option<Arc<dyn IdentityObserver>>) {
        *self.observer.write() = observer;
    }

    /// Subscribe to all identity announcements of the domain.
    ///
    /// Retained announcements are processed before this returns.
    pub fn start(self: &Arc<Self>) -> Result<(), BusError> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }
        let pattern = address::make_publisher_identity_address(&self.domain, address::WILDCARD);

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_message: MessageHandler = Arc::new(move |address: &str, message: &str| {
            if message.is_empty() {
                debug!(address = address, "Ignoring cleared identity");
                return;
            }
            if let Some(this) = weak.upgrade() {
                this.receive_announcement(address, message);
            }
        });

        *subscription = Some(self.transport.subscribe(&pattern, on_message)?);
        info!(pattern = %pattern, "Listening for publisher identities");
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.transport.unsubscribe(id);
            info!(domain = %self.domain, "Stopped listening for publisher identities");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Decide on one identity announcement and store it when trusted.
    pub fn handle_publisher_discovery(
        &self,
        address: &str,
        message: &str,
    ) -> Result<Arc<PublisherIdentityMessage>, CommandError> {
        let (identity, signing_key) = self.decode_identity(address, message)?;
        let dss_address = address::make_dss_identity_address(&self.domain);

        let mut state = self.state.lock();
        if let TrustState::DssVerified { dss_key } = *state {
            let signature = identity
                .identity_signature
                .as_deref()
                .ok_or_else(|| CommandError::TrustRejected {
                    address: address.to_string(),
                })?;
            verify_identity(&identity.identity, signature, &dss_key).map_err(|e| {
                warn!(address = address, error = %e, "Identity not DSS-countersigned");
                CommandError::TrustRejected {
                    address: address.to_string(),
                }
            })?;
        }

        if address == dss_address {
            *state = state.with_dss_key(signing_key);
            info!(address = address, "Domain security service discovered");
        }

        let trust = state.as_str();
        let stored = self.directory.update_publisher(identity);
        info!(address = address, trust = trust, "Publisher identity accepted");
        Ok(stored)
    }

    fn receive_announcement(&self, address: &str, message: &str) {
        let result = self.handle_publisher_discovery(address, message);
        let observer = self.observer.read().clone();
        match result {
            Ok(_) => {
                if let Some(observer) = observer {
                    observer.on_accepted(address, self.trust_state());
                }
            }
            Err(e) => {
                warn!(address = address, kind = e.kind(), error = %e, "Publisher identity rejected");
                if let Some(observer) = observer {
                    observer.on_rejected(address, &e);
                }
            }
        }
    }

    /// Parse an announcement and its signing key.
    fn decode_identity(
        &self,
        address: &str,
        message: &str,
    ) -> Result<(PublisherIdentityMessage, Secp256k1PublicKey), CommandError> {
        let identity = match SignedEnvelope::parse(message) {
            Ok(envelope) => serde_json::from_slice::<PublisherIdentityMessage>(envelope.payload()),
            Err(_) if self.require_signed => {
                return Err(CommandError::PolicyViolation {
                    address: address.to_string(),
                    reason: "identity announcement is not signed".into(),
                });
            }
            Err(_) => serde_json::from_str::<PublisherIdentityMessage>(message),
        }
        .map_err(|e| CommandError::DecodeFailure {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        if identity.address() != address {
            return Err(CommandError::PolicyViolation {
                address: address.to_string(),
                reason: format!("announces identity '{}'", identity.address()),
            });
        }
        let signing_key = Secp256k1PublicKey::from_base64url(&identity.identity.public_signing_key)
            .map_err(|e| CommandError::DecodeFailure {
                address: address.to_string(),
                reason: format!("signing key: {e}"),
            })?;
        Ok((identity, signing_key))
    }
}
