use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarHistoryError {
    #[error("GitHub API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("repo has too many stargazers, github won't allow us to list all stars ({pages} pages, limit {max_pages})")]
    TooManyStars { pages: u32, max_pages: u32 },

    #[error("no valid tokens left")]
    NoValidTokens,

    #[error("Invalid repository name: {0}")]
    InvalidRepoName(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Worker task failed: {0}")]
    TaskFailed(String),
}

impl StarHistoryError {
    /// True when the caller should back off and try again later.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, StarHistoryError::RateLimitExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, StarHistoryError>;
