//! Dashboard session cookies: `base64url(json claims).base64url(hmac)`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared_models::auth::SessionClaims;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "intake_session";

fn mac_for(secret: &str) -> Result<HmacSha256, String> {
    if secret.is_empty() {
        return Err("Session secret is not set".to_string());
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Failed to create HMAC".to_string())
}

pub fn encode_session(username: &str, secret: &str, ttl_hours: i64) -> Result<String, String> {
    let claims = SessionClaims {
        username: username.to_string(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
        nonce: hex::encode(rand::random::<[u8; 16]>()),
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(|e| e.to_string())?);

    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload, signature))
}

pub fn decode_session(value: &str, secret: &str) -> Result<SessionClaims, String> {
    let (payload, signature) = value
        .split_once('.')
        .ok_or_else(|| "Invalid session format".to_string())?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| "Invalid session signature".to_string())?;
    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| "Invalid session signature".to_string())?;

    let claims: SessionClaims = URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| "Invalid session payload".to_string())?;

    if claims.exp <= Utc::now().timestamp() {
        return Err("Session expired".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_roundtrip_and_tamper() {
        let cookie = encode_session("front-desk", "s3cret", 1).unwrap();
        assert_eq!(decode_session(&cookie, "s3cret").unwrap().username, "front-desk");
        assert!(decode_session(&cookie, "other").is_err());

        let tampered = format!("x{}", cookie);
        assert!(decode_session(&tampered, "s3cret").is_err());
    }

    #[test]
    fn sessions_are_unique_and_expire() {
        let a = encode_session("u", "s", 1).unwrap();
        let b = encode_session("u", "s", 1).unwrap();
        assert_ne!(a, b);

        let expired = encode_session("u", "s", -1).unwrap();
        assert_eq!(decode_session(&expired, "s").unwrap_err(), "Session expired");
    }
}
