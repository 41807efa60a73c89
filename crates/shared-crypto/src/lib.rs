//! # Shared Crypto - Publisher Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Publisher identity and message signing |
//! | `symmetric` | XChaCha20-Poly1305 | Envelope body encryption |
//! | `hashing` | BLAKE3 | Envelope key derivation |
//! | `envelope` | ES256K, ECDH-ES | Compact signed and encrypted envelopes |
//! | `signer` | - | Encode/decode with sender key lookup |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic signatures
//! - **XChaCha20**: 192-bit random nonce per message
//! - **ECDH-ES**: fresh ephemeral key per encrypted message

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod envelope;
pub mod errors;
pub mod hashing;
pub mod signer;
mod symmetric;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use envelope::{decrypt_with, encrypt_for, is_encrypted, sign_payload, SignedEnvelope};
pub use errors::CryptoError;
pub use signer::{DecodedMessage, MessageSigner, PublicKeyProvider};
