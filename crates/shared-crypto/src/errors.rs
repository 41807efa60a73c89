//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Base64 or UTF-8 decoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Envelope structure is malformed
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Signer is not in the publisher directory
    #[error("Unknown sender: {0}")]
    UnknownSender(String),

    /// Payload is not valid JSON for the expected type
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}
