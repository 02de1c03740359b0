use crate::github::{API_BASE_URL, PER_PAGE};
use crate::models::CollectorConfig;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "github-star-history")]
#[command(about = "GitHub Star History - Collects the full star history of a repository")]
#[command(version)]
pub struct Cli {
    /// GitHub tokens to rotate through (repeat or comma separate)
    #[arg(long = "token", env = "GITHUB_TOKENS", value_delimiter = ',', global = true)]
    pub tokens: Vec<String>,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = API_BASE_URL, global = true)]
    pub api_url: String,

    /// Stargazers requested per page
    #[arg(long, env = "PAGE_SIZE", default_value_t = PER_PAGE, global = true)]
    pub page_size: u32,

    /// Refuse repositories needing more pages than this
    #[arg(long, env = "MAX_PAGES", default_value_t = 400, global = true)]
    pub max_pages: u32,

    /// Page requests in flight at once
    #[arg(long, env = "CONCURRENCY", default_value_t = 4, global = true)]
    pub concurrency: usize,

    /// Seconds cached pages and ETags stay valid
    #[arg(long, env = "CACHE_TTL", default_value_t = 3600, global = true)]
    pub cache_ttl: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the star history of a repository
    Stars {
        /// Repository as owner/name
        repo: String,
    },
    /// Serve star histories over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
}

impl Cli {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_pages: self.max_pages,
            max_concurrency: self.concurrency,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// Configured tokens with blanks from sloppy env values removed.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
