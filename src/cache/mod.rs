//! TTL key-value cache seam backing the CSRF token service.
//!
//! The production cache is an external collaborator; the core only performs
//! key-scoped get/set with an expiry. The memory implementation exists for
//! development and tests, including a switch that simulates an outage so the
//! CSRF fail-open path can be exercised.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any existing entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Hash-map backed [`TokenCache`] with per-entry expiry.
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<String, Entry>>,
    unreachable: AtomicBool,
}

impl MemoryTokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate a cache outage: every operation errors until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

impl Default for MemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(anyhow!("token cache unreachable"));
        }
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(anyhow!("token cache unreachable"));
        }
        let mut entries = self.entries.lock().await;
        // Expired entries are reaped on write, bounding growth.
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
