//! HMAC request signing shared by the API middleware and the monitor client.
//!
//! The canonical string is `METHOD\nPATH_WITH_QUERY\nTIMESTAMP\nhex(sha256(body))`
//! and the signature is the hex encoded HMAC-SHA256 of it.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature headers")]
    MissingHeaders,
    #[error("Invalid signature timestamp")]
    InvalidTimestamp,
    #[error("Signature timestamp outside the allowed window")]
    Expired,
    #[error("Invalid request signature")]
    Mismatch,
    #[error("Request signing is not configured")]
    NotConfigured,
}

pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

pub fn canonical_request(method: &str, path_with_query: &str, timestamp: i64, body: &[u8]) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path_with_query,
        timestamp,
        body_digest(body)
    )
}

fn mac_for(secret: &str) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::NotConfigured)
}

/// Hex signature for a request. Empty secrets are rejected.
pub fn sign_request(
    secret: &str,
    method: &str,
    path_with_query: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::NotConfigured);
    }
    let mut mac = mac_for(secret)?;
    mac.update(canonical_request(method, path_with_query, timestamp, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parts of an incoming request needed to check its signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedParts<'a> {
    pub method: &'a str,
    pub path_with_query: &'a str,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

pub fn verify_signature(
    secret: &str,
    parts: SignedParts<'_>,
    now: i64,
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::NotConfigured);
    }

    let (timestamp, signature) = match (parts.timestamp, parts.signature) {
        (Some(t), Some(s)) => (t.trim(), s.trim()),
        _ => return Err(SignatureError::MissingHeaders),
    };

    let timestamp: i64 = timestamp.parse().map_err(|_| SignatureError::InvalidTimestamp)?;
    if (now - timestamp).abs() > tolerance_seconds {
        return Err(SignatureError::Expired);
    }

    let provided = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;

    let mut mac = mac_for(secret)?;
    mac.update(canonical_request(parts.method, parts.path_with_query, timestamp, parts.body).as_bytes());
    mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
}
