#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use github_star_history::cache::{CacheError, CacheResult};
use github_star_history::{Cache, GitHubClient, MemoryCache, Metrics, Stargazer, TokenPool};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const REPO: &str = "owner/repo";
pub const STARGAZERS_PATH: &str = "/repos/owner/repo/stargazers";

pub struct TestContext {
    pub server: MockServer,
    pub cache: Arc<MemoryCache>,
    pub client: Arc<GitHubClient>,
}

impl TestContext {
    pub async fn new(tokens: &[&str]) -> Self {
        Self::with_page_size(tokens, 100).await
    }

    pub async fn with_page_size(tokens: &[&str], page_size: u32) -> Self {
        let server = MockServer::start().await;
        let cache = Arc::new(MemoryCache::new());
        let client = build_client(&server, tokens, page_size, cache.clone());

        TestContext {
            server,
            cache,
            client,
        }
    }

    /// Like [`TestContext::with_page_size`], but the client talks to `cache`
    /// instead of `self.cache`.
    pub async fn with_cache(tokens: &[&str], page_size: u32, cache: Arc<dyn Cache>) -> Self {
        let server = MockServer::start().await;
        let client = build_client(&server, tokens, page_size, cache);

        TestContext {
            server,
            cache: Arc::new(MemoryCache::new()),
            client,
        }
    }

    pub async fn requests(&self) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .expect("request recording is enabled")
    }
}

fn build_client(
    server: &MockServer,
    tokens: &[&str],
    page_size: u32,
    cache: Arc<dyn Cache>,
) -> Arc<GitHubClient> {
    let client = GitHubClient::new(
        Arc::new(TokenPool::new(tokens.iter().copied())),
        cache,
        Metrics::new().expect("metrics should register"),
    )
    .expect("client should build")
    .with_base_url(&server.uri())
    .expect("mock server uri should parse")
    .with_page_size(page_size);
    Arc::new(client)
}

/// Every operation fails as if the backing store were down.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        Err(CacheError::Backend(format!("get {} refused", key)))
    }

    async fn put(&self, key: &str, _value: String) -> CacheResult<()> {
        Err(CacheError::Backend(format!("put {} refused", key)))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        Err(CacheError::Backend(format!("delete {} refused", key)))
    }
}

/// Still hands out a stored ETag, but page reads and deletes fail.
pub struct StaleEtagCache {
    pub etag: String,
}

#[async_trait]
impl Cache for StaleEtagCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        if key.ends_with("_etag") {
            Ok(self.etag.clone())
        } else {
            Err(CacheError::Backend(format!("get {} refused", key)))
        }
    }

    async fn put(&self, _key: &str, _value: String) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        Err(CacheError::Backend(format!("delete {} refused", key)))
    }
}

/// Records how many page fetches are inside the cache at once. Each fetch
/// looks up its ETag while holding a worker slot, so the peak bounds the
/// number of concurrent page fetches from below.
#[derive(Default)]
pub struct TrackingCache {
    inner: MemoryCache,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingCache {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cache for TrackingCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> CacheResult<()> {
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.delete(key).await
    }
}

pub fn star(secs: i64) -> Stargazer {
    Stargazer {
        starred_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

/// A stargazer page the way GitHub sends it with the star media type,
/// newest first so callers can check sorting.
pub fn stars_body(first_secs: i64, count: usize) -> Value {
    let entries: Vec<Value> = (0..count as i64)
        .rev()
        .map(|i| {
            json!({
                "starred_at": star(first_secs + i).starred_at.to_rfc3339(),
                "user": { "login": format!("user{}", first_secs + i), "id": first_secs + i }
            })
        })
        .collect();
    Value::Array(entries)
}
