//! Session Gate
//!
//! Decides whether the current session is signed in by looking at the stored
//! bearer token. Signature checks belong to the server; here we only read the
//! claims and the expiry, and every bad token simply means "anonymous".

use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::Owner;
use crate::storage::KeyValueStorage;

/// Storage key of the bearer token, next to the itinerary entry
pub const TOKEN_KEY: &str = "token";

/// Where the client keeps its bearer token
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

/// Token kept in the device key-value medium
pub struct StorageCredentials {
    storage: Arc<dyn KeyValueStorage>,
}

impl StorageCredentials {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }
}

impl CredentialStore for StorageCredentials {
    fn load(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                log::warn!("Credential storage unreadable: {}", e);
                None
            }
        }
    }

    fn store(&self, token: &str) {
        if let Err(e) = self.storage.set(TOKEN_KEY, token) {
            log::warn!("Failed to persist credential: {}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            log::warn!("Failed to clear credential: {}", e);
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentials {
    fn load(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn store(&self, token: &str) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

/// Claims issued by the user service
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Authenticated {
        token: String,
        subject_id: String,
        role: Option<String>,
        expires_at: DateTime<Utc>,
    },
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn owner(&self) -> Owner {
        match self {
            Session::Anonymous => Owner::Local,
            Session::Authenticated { subject_id, .. } => Owner::User(subject_id.clone()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { token, .. } => Some(token),
        }
    }
}

#[derive(Clone)]
pub struct SessionGate {
    credentials: Arc<dyn CredentialStore>,
}

impl SessionGate {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Gate that is always anonymous until `login` is called
    pub fn anonymous() -> Self {
        Self::new(Arc::new(MemoryCredentials::new()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub fn session(&self) -> Session {
        self.session_at(Utc::now())
    }

    pub fn session_at(&self, now: DateTime<Utc>) -> Session {
        match self.credentials.load() {
            Some(token) => evaluate(&token, now),
            None => Session::Anonymous,
        }
    }

    /// Store a freshly issued token and report what it grants
    pub fn login(&self, token: &str) -> Session {
        self.credentials.store(token.trim());
        self.session()
    }

    pub fn logout(&self) {
        self.credentials.clear();
    }

    /// Drop a stored token that no longer authenticates. Returns true if one was dropped.
    pub fn clear_if_invalid(&self) -> bool {
        if self.credentials.load().is_some() && !self.is_authenticated() {
            self.credentials.clear();
            return true;
        }
        false
    }
}

fn evaluate(token: &str, now: DateTime<Utc>) -> Session {
    let Some(claims) = decode_claims(token) else {
        log::debug!("Stored credential is malformed");
        return Session::Anonymous;
    };
    let Some(expires_at) = Utc.timestamp_opt(claims.exp, 0).single() else {
        return Session::Anonymous;
    };
    if expires_at <= now {
        log::debug!("Stored credential expired at {}", expires_at);
        return Session::Anonymous;
    }
    let Some(subject_id) = claims.subject() else {
        return Session::Anonymous;
    };

    Session::Authenticated {
        token: token.to_string(),
        subject_id,
        role: claims.scope,
        expires_at,
    }
}

/// Read the payload of a three-segment token without checking its signature
fn decode_claims(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('=')).ok()?;
    serde_json::from_slice(&payload).ok()
}
