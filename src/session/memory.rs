//! In-memory session store for development and tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{SessionData, SessionStore};

/// Hash-map backed [`SessionStore`].
///
/// Failure injection (`fail_loads`, `fail_saves`, `fail_read_back`) and an artificial write
/// latency exist so the callback pipeline can be exercised against a store
/// that lags, rejects writes, or silently drops them.
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, SessionData>>,
    write_latency: Duration,
    read_back_enabled: bool,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    fail_read_back: AtomicBool,
    drop_writes: AtomicBool,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            write_latency: Duration::ZERO,
            read_back_enabled: true,
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            fail_read_back: AtomicBool::new(false),
            drop_writes: AtomicBool::new(false),
        }
    }

    /// Delay applied before every write, simulating a slow backend.
    #[must_use]
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Disable the read-back capability, as stores without a direct
    /// by-id read would report.
    #[must_use]
    pub fn without_read_back(mut self) -> Self {
        self.read_back_enabled = false;
        self
    }

    /// Make subsequent loads return an error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves return an error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent read-backs return an error.
    pub fn set_fail_read_back(&self, fail: bool) {
        self.fail_read_back.store(fail, Ordering::SeqCst);
    }

    /// Accept saves but do not persist them (the silent-drop failure mode).
    pub fn set_drop_writes(&self, drop: bool) {
        self.drop_writes.store(drop, Ordering::SeqCst);
    }

    /// Number of stored sessions; used by the health probe and tests.
    pub async fn session_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(anyhow!("session store unreachable"));
        }
        Ok(self.entries.lock().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<()> {
        if self.write_latency > Duration::ZERO {
            tokio::time::sleep(self.write_latency).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("session store rejected write"));
        }
        if self.drop_writes.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.entries
            .lock()
            .await
            .insert(session_id.to_string(), data.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        self.entries.lock().await.remove(session_id);
        Ok(())
    }

    fn supports_read_back(&self) -> bool {
        self.read_back_enabled
    }

    async fn read_back(&self, session_id: &str) -> Result<Option<SessionData>> {
        if self.fail_read_back.load(Ordering::SeqCst) {
            return Err(anyhow!("session store read-back unavailable"));
        }
        self.load(session_id).await
    }
}
