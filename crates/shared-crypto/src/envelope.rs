//! # Message Envelopes
//!
//! Compact, dot-separated envelopes carried as the bus payload.
//!
//! ## Formats
//!
//! | Kind | Layout |
//! |------|--------|
//! | Signed | `b64(header).b64(payload).b64(signature)` |
//! | Encrypted | `b64(header).b64(ephemeral_key).b64(nonce).b64(ciphertext)` |
//!
//! All segments are base64url without padding, so a `.` never appears
//! inside a segment.
//!
//! ## Signed
//!
//! The signature is ECDSA secp256k1 over the ASCII bytes of
//! `b64(header).b64(payload)`.
//!
//! ## Encrypted
//!
//! The sender generates an ephemeral secp256k1 key and performs ECDH with the
//! recipient's public key. The shared secret is run through BLAKE3
//! `derive_key` and the result keys XChaCha20-Poly1305.

use crate::ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
use crate::hashing::{derive_key, ENVELOPE_KEY_CONTEXT};
use crate::symmetric::{self, BodyKey};
use crate::CryptoError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k256::ecdh::EphemeralSecret;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Signature algorithm label.
pub const ALG_SIGNED: &str = "ES256K";
/// Key agreement label.
pub const ALG_ENCRYPTED: &str = "ECDH-ES";
/// Content encryption label.
pub const ENC_XCHACHA: &str = "XC20P";

const SEPARATOR: char = '.';

/// Protected header of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Signature or key agreement algorithm.
    pub alg: String,
    /// Content encryption algorithm, present on encrypted envelopes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,
    /// Envelope type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl EnvelopeHeader {
    fn signed() -> Self {
        Self {
            alg: ALG_SIGNED.to_string(),
            enc: None,
            typ: Some("JWS".to_string()),
        }
    }

    fn encrypted() -> Self {
        Self {
            alg: ALG_ENCRYPTED.to_string(),
            enc: Some(ENC_XCHACHA.to_string()),
            typ: Some("JWE".to_string()),
        }
    }
}

fn b64_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64_decode(segment: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}

fn decode_header(segment: &str) -> Result<EnvelopeHeader, CryptoError> {
    let raw = b64_decode(segment)?;
    serde_json::from_slice(&raw).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
}

fn encode_header(header: &EnvelopeHeader) -> Result<String, CryptoError> {
    let json =
        serde_json::to_vec(header).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
    Ok(b64_encode(&json))
}

// =============================================================================
// SIGNED ENVELOPES
// =============================================================================

/// A parsed, not yet verified, signed envelope.
#[derive(Clone, Debug)]
pub struct SignedEnvelope {
    header: EnvelopeHeader,
    signing_input: String,
    payload: Vec<u8>,
    signature: Secp256k1Signature,
}

impl SignedEnvelope {
    /// Parse the compact signed form.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedEnvelope` if the message does not have
    /// three segments or the header does not announce a signature.
    pub fn parse(message: &str) -> Result<Self, CryptoError> {
        let mut parts = message.trim().split(SEPARATOR);
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::MalformedEnvelope(
                "signed envelope needs 3 segments".into(),
            ));
        };

        let header = decode_header(header_b64)?;
        if header.alg != ALG_SIGNED || header.enc.is_some() {
            return Err(CryptoError::MalformedEnvelope(format!(
                "unsupported signature algorithm '{}'",
                header.alg
            )));
        }
        let payload = b64_decode(payload_b64)?;
        let signature = Secp256k1Signature::from_base64url(sig_b64)?;

        Ok(Self {
            header,
            signing_input: format!("{header_b64}{SEPARATOR}{payload_b64}"),
            payload,
            signature,
        })
    }

    /// Envelope header.
    #[must_use]
    pub fn header(&self) -> &EnvelopeHeader {
        &self.header
    }

    /// Payload bytes. Not authenticated until [`SignedEnvelope::verify`]
    /// succeeds.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Verify the signature with the signer's public key.
    pub fn verify(&self, key: &Secp256k1PublicKey) -> Result<(), CryptoError> {
        key.verify(self.signing_input.as_bytes(), &self.signature)
    }
}

/// Sign a payload and return the compact signed envelope.
pub fn sign_payload(payload: &[u8], keypair: &Secp256k1KeyPair) -> Result<String, CryptoError> {
    let header_b64 = encode_header(&EnvelopeHeader::signed())?;
    let signing_input = format!("{header_b64}{SEPARATOR}{}", b64_encode(payload));
    let signature = keypair.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}{SEPARATOR}{}",
        signature.to_base64url()
    ))
}

// =============================================================================
// ENCRYPTED ENVELOPES
// =============================================================================

/// Returns true when the message parses as an encrypted envelope header.
///
/// The ciphertext is not checked.
#[must_use]
pub fn is_encrypted(message: &str) -> bool {
    let trimmed = message.trim();
    if trimmed.split(SEPARATOR).count() != 4 {
        return false;
    }
    trimmed
        .split(SEPARATOR)
        .next()
        .and_then(|h| decode_header(h).ok())
        .is_some_and(|h| h.enc.is_some())
}

/// Encrypt a plaintext for a recipient.
pub fn encrypt_for(
    plaintext: &[u8],
    recipient: &Secp256k1PublicKey,
) -> Result<String, CryptoError> {
    let recipient_key = recipient.to_k256()?;
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(true);
    let shared = ephemeral.diffie_hellman(&recipient_key);

    let key = BodyKey::new(derive_key(
        ENVELOPE_KEY_CONTEXT,
        shared.raw_secret_bytes().as_slice(),
    ));
    let (ciphertext, nonce) = symmetric::seal(&key, plaintext)?;

    Ok([
        encode_header(&EnvelopeHeader::encrypted())?,
        b64_encode(ephemeral_public.as_bytes()),
        b64_encode(&nonce),
        b64_encode(&ciphertext),
    ]
    .join("."))
}

/// Decrypt an encrypted envelope addressed to `keypair`.
///
/// # Errors
///
/// - `CryptoError::MalformedEnvelope` if the layout or header is wrong
/// - `CryptoError::DecryptionFailed` if the envelope was not encrypted for
///   this key or was tampered with
pub fn decrypt_with(message: &str, keypair: &Secp256k1KeyPair) -> Result<Vec<u8>, CryptoError> {
    let segments: Vec<&str> = message.trim().split(SEPARATOR).collect();
    let [header_b64, ephemeral_b64, nonce_b64, ciphertext_b64] = segments.as_slice() else {
        return Err(CryptoError::MalformedEnvelope(
            "encrypted envelope needs 4 segments".into(),
        ));
    };

    let header = decode_header(header_b64)?;
    if header.alg != ALG_ENCRYPTED || header.enc.as_deref() != Some(ENC_XCHACHA) {
        return Err(CryptoError::MalformedEnvelope(format!(
            "unsupported encryption '{}'",
            header.alg
        )));
    }

    let ephemeral = k256::PublicKey::from_sec1_bytes(&b64_decode(ephemeral_b64)?)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let nonce = b64_decode(nonce_b64)?;
    let ciphertext = b64_decode(ciphertext_b64)?;

    let shared = k256::ecdh::diffie_hellman(keypair.secret_scalar(), ephemeral.as_affine());
    let key = BodyKey::new(derive_key(
        ENVELOPE_KEY_CONTEXT,
        shared.raw_secret_bytes().as_slice(),
    ));

    symmetric::open(&key, &ciphertext, &nonce)
}
