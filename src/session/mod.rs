//! Session data model and the session-store seam.
//!
//! The store itself is an external collaborator (Redis, Postgres, …) reached
//! through the [`SessionStore`] trait; the core only ever performs id-scoped
//! get/set/destroy operations. [`MemorySessionStore`] backs development and
//! tests, with injectable latency and failure modes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

mod memory;

pub use memory::MemorySessionStore;

/// Cookie carrying the opaque session id.
pub const SESSION_COOKIE_NAME: &str = "vetrina_session";

// Key names are kept from the pre-rewrite session records so sessions
// written by the old stack stay readable during the migration window.
const USER_KEY: &str = "passportUser";
const LAST_ATTEMPT_KEY: &str = "lastOAuthAttempt";
const OAUTH_STATE_KEY: &str = "oauthState";

/// Marker recorded when a callback request with `code`/`state` arrives.
///
/// Only truncated previews are stored; raw authorization codes and state
/// values never land in the session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthAttempt {
    pub code_preview: String,
    pub state_preview: String,
    pub timestamp: u64,
    /// Set when a state mismatch on this attempt went through recovery and
    /// the session survived.
    pub recovered: bool,
}

impl OAuthAttempt {
    #[must_use]
    pub fn age_seconds(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Server-side session record: a JSON object bag with typed accessors for
/// the fields the auth core owns.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionData(Map<String, Value>);

impl SessionData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level keys; the recovery decision uses this to spot
    /// near-empty corrupted sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Provider-derived user reference, set only after a successful login.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.0.get(USER_KEY).and_then(Value::as_str)
    }

    pub fn set_user_id(&mut self, user_id: &str) {
        self.0
            .insert(USER_KEY.to_string(), Value::String(user_id.to_string()));
    }

    pub fn clear_user_id(&mut self) -> Option<Value> {
        self.0.remove(USER_KEY)
    }

    #[must_use]
    pub fn oauth_attempt(&self) -> Option<OAuthAttempt> {
        let value = self.0.get(LAST_ATTEMPT_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set_oauth_attempt(&mut self, attempt: &OAuthAttempt) -> Result<()> {
        let value = serde_json::to_value(attempt).context("failed to encode oauth attempt")?;
        self.0.insert(LAST_ATTEMPT_KEY.to_string(), value);
        Ok(())
    }

    pub fn clear_oauth_attempt(&mut self) -> Option<Value> {
        self.0.remove(LAST_ATTEMPT_KEY)
    }

    /// Anti-CSRF state issued when the login redirect was built.
    #[must_use]
    pub fn oauth_state(&self) -> Option<&str> {
        self.0.get(OAUTH_STATE_KEY).and_then(Value::as_str)
    }

    pub fn set_oauth_state(&mut self, state: &str) {
        self.0
            .insert(OAUTH_STATE_KEY.to_string(), Value::String(state.to_string()));
    }

    pub fn clear_oauth_state(&mut self) -> Option<Value> {
        self.0.remove(OAUTH_STATE_KEY)
    }
}

/// Create a new opaque session id for the auth cookie.
/// The raw value is only returned to set the cookie; the store keys off it.
pub fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session id")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// External session store, id-scoped operations only.
///
/// `read_back` exists for persistence verification: it must bypass any
/// in-process cache and report what is durably stored. Backends without that
/// capability leave `supports_read_back` at `false`, which makes
/// verification best-effort.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>>;

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<()>;

    async fn destroy(&self, session_id: &str) -> Result<()>;

    fn supports_read_back(&self) -> bool {
        false
    }

    async fn read_back(&self, _session_id: &str) -> Result<Option<SessionData>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    #[test]
    fn session_data_user_id_round_trip() {
        let mut data = SessionData::new();
        assert_eq!(data.user_id(), None);
        data.set_user_id("user-1");
        assert_eq!(data.user_id(), Some("user-1"));
        data.clear_user_id();
        assert_eq!(data.user_id(), None);
    }

    #[test]
    fn session_data_counts_top_level_keys() {
        let mut data = SessionData::new();
        assert!(data.is_empty());
        data.set_user_id("user-1");
        data.insert("cart", json!({"items": 2}));
        data.set_oauth_state("state");
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn oauth_attempt_round_trips_through_session() -> anyhow::Result<()> {
        let mut data = SessionData::new();
        let attempt = OAuthAttempt {
            code_preview: "abcd1234".to_string(),
            state_preview: "wxyz9876".to_string(),
            timestamp: 1_700_000_000,
            recovered: false,
        };
        data.set_oauth_attempt(&attempt)?;
        assert_eq!(data.oauth_attempt(), Some(attempt));
        data.clear_oauth_attempt();
        assert_eq!(data.oauth_attempt(), None);
        Ok(())
    }

    #[test]
    fn oauth_attempt_age_is_saturating() {
        let attempt = OAuthAttempt {
            code_preview: String::new(),
            state_preview: String::new(),
            timestamp: 100,
            recovered: false,
        };
        assert_eq!(attempt.age_seconds(160), 60);
        assert_eq!(attempt.age_seconds(50), 0);
    }

    #[test]
    fn session_data_serializes_legacy_keys() -> anyhow::Result<()> {
        let mut data = SessionData::new();
        data.set_user_id("user-7");
        let value = serde_json::to_value(&data)?;
        assert_eq!(value.get("passportUser"), Some(&json!("user-7")));
        Ok(())
    }

    #[test]
    fn generate_session_id_is_opaque_and_unique() -> anyhow::Result<()> {
        let first = generate_session_id()?;
        let second = generate_session_id()?;
        assert_ne!(first, second);
        let decoded = URL_SAFE_NO_PAD.decode(first.as_bytes())?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }
}
