//! # Domain Publishers
//!
//! Directory of the publisher identities accepted by the trust chain, keyed
//! by identity address. Read on every command decode, written only when an
//! identity is accepted, hence the `RwLock`.

use parking_lot::RwLock;
use shared_crypto::{PublicKeyProvider, Secp256k1PublicKey};
use shared_types::entities::PublisherIdentityMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Known publishers of the domain.
#[derive(Default)]
pub struct DomainPublishers {
    publishers: RwLock<HashMap<String, Arc<PublisherIdentityMessage>>>,
}

impl DomainPublishers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a publisher identity.
    pub fn update_publisher(&self, identity: PublisherIdentityMessage) -> Arc<PublisherIdentityMessage> {
        let identity = Arc::new(identity);
        debug!(address = identity.address(), "Publisher identity stored");
        self.publishers
            .write()
            .insert(identity.address().to_string(), identity.clone());
        identity
    }

    #[must_use]
    pub fn get_publisher(&self, address: &str) -> Option<Arc<PublisherIdentityMessage>> {
        self.publishers.read().get(address).cloned()
    }

    /// Signing key of a publisher, if known and well formed.
    #[must_use]
    pub fn get_publisher_key(&self, address: &str) -> Option<Secp256k1PublicKey> {
        let identity = self.get_publisher(address)?;
        match Secp256k1PublicKey::from_base64url(&identity.identity.public_signing_key) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(address = address, error = %e, "Stored publisher has an unusable signing key");
                None
            }
        }
    }

    /// All publishers, ordered by address.
    #[must_use]
    pub fn get_all_publishers(&self) -> Vec<Arc<PublisherIdentityMessage>> {
        let mut all: Vec<_> = self.publishers.read().values().cloned().collect();
        all.sort_by(|a, b| a.address().cmp(b.address()));
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.publishers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publishers.read().is_empty()
    }
}

impl PublicKeyProvider for DomainPublishers {
    fn public_key(&self, address: &str) -> Option<Secp256k1PublicKey> {
        self.get_publisher_key(address)
    }
}
