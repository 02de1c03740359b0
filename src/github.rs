use crate::cache::{self, Cache, CacheError};
use crate::error::{Result, StarHistoryError};
use crate::metrics::Metrics;
use crate::models::StarPage;
use crate::tokens::TokenPool;
use crate::types::{Repository, Stargazer};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, IF_NONE_MATCH};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const API_BASE_URL: &str = "https://api.github.com";
pub const PER_PAGE: u32 = 100;

const REPO_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const STAR_MEDIA_TYPE: &str = "application/vnd.github.v3.star+json";

/// Unconditional refetches allowed after a 304 whose page is gone from cache.
const MAX_STALE_ETAG_RETRIES: u32 = 1;

pub struct GitHubClient {
    client: Client,
    base_url: Url,
    page_size: u32,
    tokens: Arc<TokenPool>,
    cache: Arc<dyn Cache>,
    metrics: Metrics,
}

impl GitHubClient {
    pub fn new(tokens: Arc<TokenPool>, cache: Arc<dyn Cache>, metrics: Metrics) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("github-star-history/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = parse_base_url(API_BASE_URL)?;

        Ok(GitHubClient {
            client,
            base_url,
            page_size: PER_PAGE,
            tokens,
            cache,
            metrics,
        })
    }

    /// Points the client at another API root, e.g. a GitHub Enterprise host.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn tokens(&self) -> &TokenPool {
        &self.tokens
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn endpoint(&self, full_name: &str, tail: &[&str]) -> Result<Url> {
        let (owner, name) = split_full_name(full_name)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StarHistoryError::ApiError(format!("invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["repos", owner, name])
            .extend(tail);
        Ok(url)
    }

    fn stargazers_url(&self, full_name: &str, page: u32) -> Result<Url> {
        let mut url = self.endpoint(full_name, &["stargazers"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.page_size.to_string());
        Ok(url)
    }

    /// Sends a GET authorized with the next token from the pool.
    ///
    /// A 401 invalidates the token that caused it and the request is retried
    /// with the next one; the loop ends once the pool runs dry.
    async fn authorized_get(&self, url: &Url, accept: &str, etag: Option<&str>) -> Result<Response> {
        loop {
            let token = self.tokens.pick()?;

            let mut request = self.client.get(url.clone()).header(ACCEPT, accept);
            if let Some(etag) = etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(token) = &token {
                request = request.header(AUTHORIZATION, format!("token {}", token.key()));
            }

            let response = request.send().await?;
            match token {
                Some(token) if response.status() == StatusCode::UNAUTHORIZED => {
                    warn!(token = %token, %url, "token rejected by GitHub");
                    token.invalidate();
                }
                _ => return Ok(response),
            }
        }
    }

    /// Fetches repository metadata, including the current stargazer count.
    pub async fn get_repository(&self, full_name: &str) -> Result<Repository> {
        let url = self.endpoint(full_name, &[])?;
        let response = self.authorized_get(&url, REPO_MEDIA_TYPE, None).await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(StarHistoryError::NotFound(full_name.to_string())),
            StatusCode::FORBIDDEN => {
                self.metrics.inc_rate_limit();
                Err(self.rate_limit_error(&response, full_name))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(StarHistoryError::ApiError(format!(
                    "API request failed with status {}: {}",
                    status, error_text
                )))
            }
        }
    }

    /// Fetches one page of stargazers, revalidating against the cached ETag.
    ///
    /// An empty page yields [`StarPage::End`].
    pub async fn fetch_stargazers_page(&self, repo: &Repository, page: u32) -> Result<StarPage> {
        let repo_name = repo.full_name.as_str();
        let key = page_cache_key(repo_name, page);
        let etag_key = etag_cache_key(repo_name, page);
        let url = self.stargazers_url(repo_name, page)?;

        let mut stale_retries = 0;
        loop {
            let etag = if stale_retries == 0 {
                match self.cache.get(&etag_key).await {
                    Ok(etag) => Some(etag),
                    Err(CacheError::Miss(_)) => {
                        debug!(repo = repo_name, page, "no cached {}", etag_key);
                        None
                    }
                    Err(e) => {
                        warn!(repo = repo_name, page, error = %e, "failed to get {} from cache", etag_key);
                        None
                    }
                }
            } else {
                None
            };

            let response = self
                .authorized_get(&url, STAR_MEDIA_TYPE, etag.as_deref())
                .await?;

            match response.status() {
                StatusCode::NOT_MODIFIED => {
                    match cache::get_json::<Vec<Stargazer>>(self.cache.as_ref(), &key).await {
                        Ok(stars) => {
                            self.metrics.inc_effective_etag();
                            info!(repo = repo_name, page, "not modified");
                            return Ok(StarPage::Stars(stars));
                        }
                        Err(e) => {
                            warn!(repo = repo_name, page, error = %e, "failed to get {} from cache", key);
                            if stale_retries >= MAX_STALE_ETAG_RETRIES {
                                return Err(StarHistoryError::ApiError(format!(
                                    "{} page {} not modified but missing from cache",
                                    repo_name, page
                                )));
                            }
                            if let Err(e) = self.cache.delete(&etag_key).await {
                                warn!(repo = repo_name, page, error = %e, "failed to delete {} from cache", etag_key);
                            }
                            stale_retries += 1;
                        }
                    }
                }
                StatusCode::FORBIDDEN => {
                    self.metrics.inc_rate_limit();
                    warn!(repo = repo_name, page, "rate limit hit");
                    return Err(self.rate_limit_error(&response, repo_name));
                }
                StatusCode::OK => {
                    let new_etag = response
                        .headers()
                        .get(ETAG)
                        .and_then(|h| h.to_str().ok())
                        .map(str::to_owned);
                    let body = response.text().await?;
                    let stars: Vec<Stargazer> = serde_json::from_str(&body)?;

                    if stars.is_empty() {
                        debug!(repo = repo_name, page, "no more pages");
                        return Ok(StarPage::End);
                    }

                    if let Err(e) = cache::put_json(self.cache.as_ref(), &key, &stars).await {
                        warn!(repo = repo_name, page, error = %e, "failed to cache {}", key);
                    }
                    if let Some(new_etag) = new_etag.filter(|e| !e.is_empty()) {
                        if let Err(e) = self.cache.put(&etag_key, new_etag).await {
                            warn!(repo = repo_name, page, error = %e, "failed to cache {}", etag_key);
                        }
                    }

                    debug!(repo = repo_name, page, count = stars.len(), "fetched page");
                    return Ok(StarPage::Stars(stars));
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(StarHistoryError::ApiError(format!(
                        "API request failed with status {}: {}",
                        status, error_text
                    )));
                }
            }
        }
    }

    fn rate_limit_error(&self, response: &Response, what: &str) -> StarHistoryError {
        let message = match rate_limit_reset(response) {
            Some(reset) => format!("API rate limit exceeded for {}. Reset at: {}", what, reset),
            None => format!("API rate limit exceeded for {}", what),
        };
        StarHistoryError::RateLimitExceeded(message)
    }
}

/// When the exhausted quota resets, from `X-RateLimit-Reset` (epoch seconds).
fn rate_limit_reset(response: &Response) -> Option<DateTime<Utc>> {
    response
        .headers()
        .get("X-RateLimit-Reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
}

pub fn page_cache_key(full_name: &str, page: u32) -> String {
    format!("{}_{}", full_name, page)
}

pub fn etag_cache_key(full_name: &str, page: u32) -> String {
    format!("{}_etag", page_cache_key(full_name, page))
}

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(StarHistoryError::InvalidRepoName(format!(
            "Invalid repository name format: {}",
            full_name
        ))),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| StarHistoryError::ApiError(format!("invalid API base URL {}: {}", raw, e)))
}
