pub mod cache;
pub mod cli;
pub mod collector;
pub mod error;
pub mod github;
pub mod metrics;
pub mod models;
pub mod server;
pub mod tokens;
pub mod types;

pub use cache::{Cache, CacheError, MemoryCache};
pub use collector::StarCollector;
pub use error::{Result, StarHistoryError};
pub use github::GitHubClient;
pub use metrics::Metrics;
pub use models::{CollectorConfig, StarPage};
pub use tokens::{Token, TokenPool};
pub use types::{Repository, Stargazer};
