//! In-process key/value cache with per-key expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::SessionError;

/// Longest lifetime a key can be given; longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe string cache where every key carries its own deadline.
///
/// Expired keys are invisible to reads immediately; [`TtlCache::purge_expired`]
/// reclaims their memory.
#[derive(Clone)]
pub struct TtlCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    alive: Arc<AtomicBool>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the cache currently accepts operations.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn check_alive(&self) -> Result<(), SessionError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(SessionError::Unavailable)
        }
    }

    /// Store `value` under `key`, expiring after `ttl` (at most [`MAX_TTL`]).
    /// Overwrites any previous value.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        self.check_alive()?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl.min(MAX_TTL),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    /// Read a live value. Does not extend its expiry.
    pub async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        self.check_alive()?;
        let now = Instant::now();
        let value = self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        Ok(value)
    }

    /// Remaining lifetime of a live key.
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>, SessionError> {
        self.check_alive()?;
        let now = Instant::now();
        let remaining = self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now);
        Ok(remaining)
    }

    /// Delete a key. Returns whether a live value was removed.
    pub async fn del(&self, key: &str) -> Result<bool, SessionError> {
        self.check_alive()?;
        let now = Instant::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    /// Drop every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        drop(entries);
        if removed > 0 {
            debug!(removed, "Purged expired cache keys");
        }
        removed
    }

    /// Stop accepting operations and drop all keys.
    pub async fn close(&self) {
        self.alive.store(false, Ordering::Release);
        self.entries.write().await.clear();
        info!("Session cache closed");
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
