//! # Trust State
//!
//! How much the domain trusts identity announcements.
//!
//! | State | Accepts |
//! |-------|---------|
//! | `AddressProtectionOnly` | any well formed identity; the bus is trusted to protect addresses |
//! | `DssVerified` | only identities countersigned by the domain security service |
//!
//! The only transition is `AddressProtectionOnly` → `DssVerified`, taken when
//! the DSS identity is accepted. Later DSS identities replace the key but
//! never return to address protection.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use shared_crypto::{CryptoError, Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
use shared_types::entities::PublisherIdentity;

/// Trust level of the publisher chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustState {
    /// No DSS discovered yet.
    AddressProtectionOnly,
    /// Identities must carry a countersignature by `dss_key`.
    DssVerified { dss_key: Secp256k1PublicKey },
}

impl TrustState {
    /// Move to `DssVerified` with a new DSS key.
    #[must_use]
    pub fn with_dss_key(self, dss_key: Secp256k1PublicKey) -> Self {
        Self::DssVerified { dss_key }
    }

    #[must_use]
    pub fn dss_key(&self) -> Option<Secp256k1PublicKey> {
        match self {
            Self::AddressProtectionOnly => None,
            Self::DssVerified { dss_key } => Some(*dss_key),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressProtectionOnly => "address_protection_only",
            Self::DssVerified { .. } => "dss_verified",
        }
    }
}

/// Canonical form of an identity: padded base64url of its JSON encoding.
pub fn canonical_identity(identity: &PublisherIdentity) -> Result<String, CryptoError> {
    let json = serde_json::to_vec(identity).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    Ok(URL_SAFE.encode(json))
}

/// Countersign an identity with the DSS key.
///
/// Returns the base64url signature for `identity_signature`.
pub fn sign_identity(
    identity: &PublisherIdentity,
    dss_keypair: &Secp256k1KeyPair,
) -> Result<String, CryptoError> {
    let canonical = canonical_identity(identity)?;
    Ok(dss_keypair.sign(canonical.as_bytes()).to_base64url())
}

/// Check a countersignature against the DSS key.
pub fn verify_identity(
    identity: &PublisherIdentity,
    signature: &str,
    dss_key: &Secp256k1PublicKey,
) -> Result<(), CryptoError> {
    let canonical = canonical_identity(identity)?;
    let signature = Secp256k1Signature::from_base64url(signature)?;
    dss_key.verify(canonical.as_bytes(), &signature)
}
