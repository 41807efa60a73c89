//! # BLAKE3 Key Derivation
//!
//! Derives symmetric envelope keys from ECDH shared secrets.
//!
//! ## Domain Separation
//!
//! Every derived key is bound to a context string so the same shared secret
//! can never produce the same key for two purposes.

/// BLAKE3 output (256-bit).
pub type Hash = [u8; 32];

/// Context for envelope encryption keys.
pub const ENVELOPE_KEY_CONTEXT: &str = "iotdomain 2024-01 envelope encryption key";

/// Hash data with BLAKE3 (one-shot).
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Derive a 256-bit key from key material under a context string.
pub fn derive_key(context: &str, key_material: &[u8]) -> Hash {
    blake3::derive_key(context, key_material)
}
