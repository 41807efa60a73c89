//! # Message Signer
//!
//! Encodes outgoing messages and decodes incoming ones.
//!
//! Decoding never fails outright. It reports what protection the message
//! carried (`is_encrypted`, `is_signed`) alongside the payload result, so the
//! caller can enforce its own policy before looking at the payload.
//!
//! ## Decode Order
//!
//! 1. Encrypted envelope: decrypt with our own key.
//! 2. Signed envelope: read `sender` from the payload, look up the sender's
//!    key via [`PublicKeyProvider`] and verify.
//! 3. Anything else: plain JSON.

use crate::ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey};
use crate::envelope::{self, SignedEnvelope};
use crate::CryptoError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Field in every signed payload naming the signer's address.
pub const SENDER_FIELD: &str = "sender";

/// Resolves a publisher address to its signing key.
pub trait PublicKeyProvider: Send + Sync {
    /// Public key of the publisher at `address`, if known.
    fn public_key(&self, address: &str) -> Option<Secp256k1PublicKey>;
}

/// Result of decoding an incoming message.
#[derive(Debug)]
pub struct DecodedMessage<T> {
    /// The message arrived in an encrypted envelope.
    pub is_encrypted: bool,
    /// The message arrived in a signed envelope.
    pub is_signed: bool,
    /// Decoded payload, or why it could not be decoded or verified.
    pub payload: Result<T, CryptoError>,
}

/// Signs, encrypts and decodes messages for one publisher.
#[derive(Clone)]
pub struct MessageSigner {
    keypair: Arc<Secp256k1KeyPair>,
    keys: Arc<dyn PublicKeyProvider>,
}

impl MessageSigner {
    /// Create a signer around our keypair and a sender key directory.
    pub fn new(keypair: Arc<Secp256k1KeyPair>, keys: Arc<dyn PublicKeyProvider>) -> Self {
        Self { keypair, keys }
    }

    /// Our public key.
    #[must_use]
    pub fn public_key(&self) -> Secp256k1PublicKey {
        self.keypair.public_key()
    }

    /// Serialize and sign a payload.
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, CryptoError> {
        let json =
            serde_json::to_vec(payload).map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
        envelope::sign_payload(&json, &self.keypair)
    }

    /// Sign a payload, then encrypt the signed envelope for `recipient`.
    pub fn sign_and_encrypt<T: Serialize>(
        &self,
        payload: &T,
        recipient: &Secp256k1PublicKey,
    ) -> Result<String, CryptoError> {
        let signed = self.sign(payload)?;
        envelope::encrypt_for(signed.as_bytes(), recipient)
    }

    /// Decode an incoming message.
    pub fn decode_message<T: DeserializeOwned>(&self, message: &str) -> DecodedMessage<T> {
        let mut decoded = DecodedMessage {
            is_encrypted: false,
            is_signed: false,
            payload: Err(CryptoError::InvalidPayload("empty message".into())),
        };

        let inner = if envelope::is_encrypted(message) {
            decoded.is_encrypted = true;
            match envelope::decrypt_with(message, &self.keypair).and_then(|plain| {
                String::from_utf8(plain).map_err(|e| CryptoError::Encoding(e.to_string()))
            }) {
                Ok(plain) => plain,
                Err(e) => {
                    decoded.payload = Err(e);
                    return decoded;
                }
            }
        } else {
            message.to_string()
        };

        match SignedEnvelope::parse(&inner) {
            Ok(signed) => {
                decoded.is_signed = true;
                decoded.payload = self.verify_signed(&signed);
            }
            Err(_) => {
                decoded.payload = serde_json::from_str(&inner)
                    .map_err(|e| CryptoError::InvalidPayload(e.to_string()));
            }
        }
        decoded
    }

    fn verify_signed<T: DeserializeOwned>(&self, signed: &SignedEnvelope) -> Result<T, CryptoError> {
        let value: serde_json::Value = serde_json::from_slice(signed.payload())
            .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
        let sender = value
            .get(SENDER_FIELD)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CryptoError::InvalidPayload("missing sender".into()))?;
        let key = self
            .keys
            .public_key(sender)
            .ok_or_else(|| CryptoError::UnknownSender(sender.to_string()))?;
        signed.verify(&key)?;
        serde_json::from_value(value).map_err(|e| CryptoError::InvalidPayload(e.to_string()))
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("public_key", &self.public_key().to_base64url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        sender: String,
        value: String,
    }

    struct Directory(HashMap<String, Secp256k1PublicKey>);

    impl PublicKeyProvider for Directory {
        fn public_key(&self, address: &str) -> Option<Secp256k1PublicKey> {
            self.0.get(address).copied()
        }
    }

    fn setup() -> (MessageSigner, MessageSigner) {
        let alice = Arc::new(Secp256k1KeyPair::generate());
        let bob = Arc::new(Secp256k1KeyPair::generate());
        let mut keys = HashMap::new();
        keys.insert("dom/alice".to_string(), alice.public_key());
        keys.insert("dom/bob".to_string(), bob.public_key());
        let directory: Arc<dyn PublicKeyProvider> = Arc::new(Directory(keys));
        (
            MessageSigner::new(alice, directory.clone()),
            MessageSigner::new(bob, directory),
        )
    }

    fn ping(sender: &str) -> Ping {
        Ping {
            sender: sender.to_string(),
            value: "42".to_string(),
        }
    }

    #[test]
    fn test_decode_plain() {
        let (_, bob) = setup();
        let decoded: DecodedMessage<Ping> =
            bob.decode_message(r#"{"sender":"dom/alice","value":"42"}"#);
        assert!(!decoded.is_signed);
        assert!(!decoded.is_encrypted);
        assert_eq!(decoded.payload.unwrap(), ping("dom/alice"));
    }

    #[test]
    fn test_decode_signed() {
        let (alice, bob) = setup();
        let message = alice.sign(&ping("dom/alice")).unwrap();
        let decoded: DecodedMessage<Ping> = bob.decode_message(&message);
        assert!(decoded.is_signed);
        assert!(!decoded.is_encrypted);
        assert_eq!(decoded.payload.unwrap(), ping("dom/alice"));
    }

    #[test]
    fn test_decode_signed_and_encrypted() {
        let (alice, bob) = setup();
        let message = alice
            .sign_and_encrypt(&ping("dom/alice"), &bob.public_key())
            .unwrap();
        let decoded: DecodedMessage<Ping> = bob.decode_message(&message);
        assert!(decoded.is_signed);
        assert!(decoded.is_encrypted);
        assert_eq!(decoded.payload.unwrap(), ping("dom/alice"));
    }

    #[test]
    fn test_impersonation_fails_verification() {
        let (alice, bob) = setup();
        // alice signs but claims to be bob
        let message = alice.sign(&ping("dom/bob")).unwrap();
        let decoded: DecodedMessage<Ping> = bob.decode_message(&message);
        assert!(decoded.is_signed);
        assert_eq!(
            decoded.payload.unwrap_err(),
            CryptoError::SignatureVerificationFailed
        );
    }

    #[test]
    fn test_unknown_sender() {
        let (alice, bob) = setup();
        let message = alice.sign(&ping("dom/mallory")).unwrap();
        let decoded: DecodedMessage<Ping> = bob.decode_message(&message);
        assert!(matches!(decoded.payload, Err(CryptoError::UnknownSender(_))));
    }

    #[test]
    fn test_encrypted_for_someone_else() {
        let (alice, bob) = setup();
        let message = bob
            .sign_and_encrypt(&ping("dom/bob"), &bob.public_key())
            .unwrap();
        let decoded: DecodedMessage<Ping> = alice.decode_message(&message);
        assert!(decoded.is_encrypted);
        assert!(!decoded.is_signed);
        assert!(matches!(decoded.payload, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_garbage() {
        let (_, bob) = setup();
        let decoded: DecodedMessage<Ping> = bob.decode_message("not json at all");
        assert!(!decoded.is_signed);
        assert!(decoded.payload.is_err());
    }
}
