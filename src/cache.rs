//! Key/value cache contract used for stargazer pages and their ETags.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss: {0}")]
    Miss(String),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Storage for cached pages and ETags. Implementations must be safe to share
/// between concurrent page fetches.
#[async_trait]
pub trait Cache: Send + Sync {
    /// A missing or expired key is reported as [`CacheError::Miss`].
    async fn get(&self, key: &str) -> CacheResult<String>;

    async fn put(&self, key: &str, value: String) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Reads a JSON encoded value.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> CacheResult<T> {
    let raw = cache.get(key).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Stores a value as JSON.
pub async fn put_json<T: Serialize + ?Sized>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
) -> CacheResult<()> {
    let raw = serde_json::to_string(value)?;
    cache.put(key, raw).await
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Option<Instant>,
}

impl Entries {
    /// Drops every expired entry, at most once per `ttl`.
    fn sweep(&mut self, ttl: Duration, now: Instant) {
        if self.last_sweep.is_some_and(|at| now.duration_since(at) < ttl) {
            return;
        }
        self.map.retain(|_, entry| !is_expired(entry, now));
        self.last_sweep = Some(now);
    }
}

/// In-process cache with optional expiry.
#[derive(Default)]
pub struct MemoryCache {
    ttl: Option<Duration>,
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .values()
            .filter(|e| !is_expired(e, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_expired(entry: &Entry, now: Instant) -> bool {
    entry.expires_at.is_some_and(|at| at <= now)
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match entries.map.get(key) {
            Some(entry) if !is_expired(entry, now) => Ok(entry.value.clone()),
            Some(_) => {
                entries.map.remove(key);
                Err(CacheError::Miss(key.to_string()))
            }
            None => Err(CacheError::Miss(key.to_string())),
        }
    }

    async fn put(&self, key: &str, value: String) -> CacheResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ttl) = self.ttl {
            entries.sweep(ttl, now);
        }
        let expires_at = self.ttl.map(|ttl| now + ttl);
        entries.map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .remove(key);
        Ok(())
    }
}
