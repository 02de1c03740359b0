use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// GitHub API response structures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub stargazers_count: u32,
}

impl Repository {
    pub fn new(full_name: impl Into<String>, stargazers_count: u32) -> Self {
        Self {
            full_name: full_name.into(),
            stargazers_count,
        }
    }
}

/// A star at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
}
