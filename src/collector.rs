//! Concurrent collection of every stargazer page of a repository.

use crate::error::{Result, StarHistoryError};
use crate::github::GitHubClient;
use crate::models::{CollectorConfig, StarPage};
use crate::types::{Repository, Stargazer};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct StarCollector {
    client: Arc<GitHubClient>,
    config: CollectorConfig,
}

impl StarCollector {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self::with_config(client, CollectorConfig::default())
    }

    pub fn with_config(client: Arc<GitHubClient>, config: CollectorConfig) -> Self {
        Self {
            client,
            config: CollectorConfig {
                max_concurrency: config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS),
                ..config
            },
        }
    }

    pub fn config(&self) -> CollectorConfig {
        self.config
    }

    pub fn client(&self) -> &Arc<GitHubClient> {
        &self.client
    }

    /// Returns every star of `repo`, oldest first.
    ///
    /// Fails with [`StarHistoryError::TooManyStars`] before any request when
    /// GitHub would not let us enumerate all pages.
    pub async fn collect(&self, repo: &Repository) -> Result<Vec<Stargazer>> {
        let page_size = self.client.page_size();
        let pages = total_pages(repo.stargazers_count, page_size);
        if pages > self.config.max_pages {
            warn!(repo = %repo.full_name, pages, "too many stargazers to list");
            return Err(StarHistoryError::TooManyStars {
                pages,
                max_pages: self.config.max_pages,
            });
        }

        let last = last_page(repo.stargazers_count, page_size);
        info!(repo = %repo.full_name, stars = repo.stargazers_count, last_page = last, "collecting stargazers");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let repo = Arc::new(repo.clone());
        let mut tasks = JoinSet::new();

        for page in 1..=last {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| StarHistoryError::TaskFailed(e.to_string()))?;
            let client = Arc::clone(&self.client);
            let repo = Arc::clone(&repo);
            tasks.spawn(async move {
                let _permit = permit;
                client.fetch_stargazers_page(&repo, page).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| StarHistoryError::TaskFailed(e.to_string()))
                .and_then(|result| result);
            match outcome {
                Ok(page) => results.push(page),
                Err(e) => {
                    warn!(repo = %repo.full_name, error = %e, "aborting star collection");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        let stars = merge_pages(results);
        debug!(repo = %repo.full_name, count = stars.len(), "collected stargazers");
        Ok(stars)
    }
}

/// Full pages implied by the star count.
pub fn total_pages(stargazers_count: u32, page_size: u32) -> u32 {
    stargazers_count / page_size.max(1)
}

/// One past the full pages: the remainder lives there, and an exact multiple
/// still needs the empty page that ends pagination.
pub fn last_page(stargazers_count: u32, page_size: u32) -> u32 {
    total_pages(stargazers_count, page_size).saturating_add(1)
}

/// Flattens page results into a single history sorted by time.
pub fn merge_pages<I>(pages: I) -> Vec<Stargazer>
where
    I: IntoIterator<Item = StarPage>,
{
    let mut stars: Vec<Stargazer> = pages.into_iter().flat_map(StarPage::into_stars).collect();
    stars.sort_by_key(|s| s.starred_at);
    stars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::metrics::Metrics;
    use crate::tokens::TokenPool;
    use chrono::{TimeZone, Utc};

    fn star(secs: i64) -> Stargazer {
        Stargazer {
            starred_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn page_arithmetic() {
        assert_eq!(total_pages(0, 100), 0);
        assert_eq!(last_page(0, 100), 1);
        assert_eq!(total_pages(250, 100), 2);
        assert_eq!(last_page(250, 100), 3);
        assert_eq!(total_pages(300, 100), 3);
        assert_eq!(last_page(300, 100), 4);
        assert_eq!(total_pages(40_000, 100), 400);
        assert_eq!(total_pages(40_100, 100), 401);
    }

    #[test]
    fn last_page_saturates() {
        assert_eq!(total_pages(u32::MAX, 1), u32::MAX);
        assert_eq!(last_page(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn concurrency_is_clamped_to_semaphore_bounds() {
        let client = Arc::new(
            GitHubClient::new(
                Arc::new(TokenPool::default()),
                Arc::new(MemoryCache::new()),
                Metrics::new().unwrap(),
            )
            .unwrap(),
        );

        let wide = StarCollector::with_config(
            Arc::clone(&client),
            CollectorConfig {
                max_pages: u32::MAX,
                max_concurrency: usize::MAX,
            },
        );
        assert_eq!(wide.config().max_concurrency, Semaphore::MAX_PERMITS);
        assert_eq!(wide.config().max_pages, u32::MAX);

        let none = StarCollector::with_config(
            client,
            CollectorConfig {
                max_pages: 400,
                max_concurrency: 0,
            },
        );
        assert_eq!(none.config().max_concurrency, 1);
    }

    #[test]
    fn merge_sorts_across_pages() {
        let merged = merge_pages(vec![
            StarPage::Stars(vec![star(30), star(10)]),
            StarPage::End,
            StarPage::Stars(vec![star(20), star(10)]),
        ]);
        let secs: Vec<i64> = merged.iter().map(|s| s.starred_at.timestamp()).collect();
        assert_eq!(secs, [10, 10, 20, 30]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge_pages(vec![StarPage::End, StarPage::End]).is_empty());
    }
}
