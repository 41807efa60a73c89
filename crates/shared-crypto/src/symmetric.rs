//! # Envelope Body Cipher
//!
//! XChaCha20-Poly1305 sealing of encrypted envelope bodies. The key is the
//! per-message BLAKE3 derivation of the ECDH shared secret and is wiped
//! after use. A fresh random 192-bit nonce travels in its own envelope
//! segment.

use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Nonce length of XChaCha20-Poly1305.
pub const NONCE_LEN: usize = 24;

/// Derived body key, zeroized on drop.
pub(crate) type BodyKey = Zeroizing<[u8; 32]>;

/// Seal a body. Returns the ciphertext and the nonce that was used.
pub(crate) fn seal(key: &BodyKey, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CryptoError> {
    let cipher = XChaCha20Poly1305::new((&**key).into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    Ok((ciphertext, nonce_bytes))
}

/// Open a sealed body.
///
/// A nonce of the wrong length is a malformed envelope; a wrong key or
/// altered ciphertext fails authentication.
pub(crate) fn open(key: &BodyKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "nonce must be {NONCE_LEN} bytes"
        )));
    }
    XChaCha20Poly1305::new((&**key).into())
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
