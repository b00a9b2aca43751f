//! Bearer token verification
//!
//! Tokens are the user service's HS256 JWTs carrying `{ id, username, scope, exp }`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Who a verified token speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    pub role: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    exp: i64,
}

impl Claims {
    fn subject(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.sub.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// Shared-secret verifier
pub struct Hs256Verifier {
    secret: Vec<u8>,
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }
}

impl TokenVerifier for Hs256Verifier {
    fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(AuthError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| AuthError::Malformed)?;
        let mac = mac_over(&self.secret, header_b64, payload_b64).ok_or(AuthError::BadSignature)?;
        mac.verify_slice(&signature).map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = decode_json(payload_b64)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        let subject_id = claims.subject().ok_or(AuthError::Malformed)?;

        Ok(Principal {
            subject_id,
            role: claims.scope,
        })
    }
}

fn mac_over(secret: &[u8], header_b64: &str, payload_b64: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}.{}", header_b64, payload_b64).as_bytes());
    Some(mac)
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

/// Issue a token the way the user service does. `exp` is a Unix timestamp.
pub fn encode_token(secret: &[u8], subject_id: &str, role: &str, exp: i64) -> Option<String> {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let claims = Claims {
        id: Some(Value::from(subject_id)),
        sub: None,
        username: None,
        scope: Some(role.to_string()),
        exp,
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).ok()?);

    let signature = mac_over(secret, &header, &payload)?.finalize().into_bytes();
    Some(format!("{}.{}.{}", header, payload, URL_SAFE_NO_PAD.encode(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn in_one_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_round_trip() {
        let token = encode_token(SECRET, "42", "CUSTOMER", in_one_hour()).unwrap();
        let principal = Hs256Verifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(principal.subject_id, "42");
        assert_eq!(principal.role.as_deref(), Some("CUSTOMER"));
    }

    #[test]
    fn test_wrong_secret() {
        let token = encode_token(b"other", "42", "CUSTOMER", in_one_hour()).unwrap();
        assert_eq!(Hs256Verifier::new(SECRET).verify(&token), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_expired() {
        let token = encode_token(SECRET, "42", "CUSTOMER", Utc::now().timestamp() - 1).unwrap();
        assert_eq!(Hs256Verifier::new(SECRET).verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_tampered_payload() {
        let token = encode_token(SECRET, "42", "CUSTOMER", in_one_hour()).unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(json!({"id": "1", "scope": "ADMIN", "exp": in_one_hour()}).to_string());
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(Hs256Verifier::new(SECRET).verify(&forged), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_malformed() {
        let verifier = Hs256Verifier::new(SECRET);
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!.e30.sig"] {
            assert_eq!(verifier.verify(bad), Err(AuthError::Malformed), "token {:?}", bad);
        }
    }
}
