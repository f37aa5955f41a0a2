//! Request authenticity.
//!
//! Every interaction is signed by the calling platform with Ed25519 over
//! `timestamp || body`; the signature arrives hex-encoded in a header.

use axum::http::HeaderMap;
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),
    #[error("{0} must be hex")]
    InvalidHex(&'static str),
    #[error("{field} must be {expected} bytes (got {got})")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("public key is not a valid ed25519 point")]
    InvalidPublicKey,
    #[error("signature does not match")]
    Mismatch,
}

/// Decode a hex-encoded Ed25519 public key.
pub fn parse_public_key(raw: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = hex::decode(raw.trim()).map_err(|_| SignatureError::InvalidHex("public key"))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidLength {
                field: "public key",
                expected: PUBLIC_KEY_LENGTH,
                got: bytes.len(),
            })?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| SignatureError::InvalidPublicKey)
}

pub fn verify(
    key: &VerifyingKey,
    timestamp: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let bytes =
        hex::decode(signature_hex.trim()).map_err(|_| SignatureError::InvalidHex("signature"))?;
    let bytes: [u8; SIGNATURE_LENGTH] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidLength {
                field: "signature",
                expected: SIGNATURE_LENGTH,
                got: bytes.len(),
            })?;
    let signature = Signature::from_bytes(&bytes);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    key.verify_strict(&message, &signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Verify a request using its signature headers.
pub fn verify_request(
    key: &VerifyingKey,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), SignatureError> {
    let signature = header(headers, SIGNATURE_HEADER)?;
    let timestamp = header(headers, TIMESTAMP_HEADER)?;
    verify(key, timestamp, body, signature)
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}
