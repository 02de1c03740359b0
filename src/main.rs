use anyhow::Context;
use clap::Parser;
use colored::*;
use github_star_history::cli::{Cli, Command};
use github_star_history::server::{start_server, AppState};
use github_star_history::{GitHubClient, MemoryCache, Metrics, StarCollector, TokenPool};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    let tokens = Arc::new(TokenPool::new(cli.tokens()));
    if tokens.is_empty() {
        eprintln!("{}", "No GitHub tokens configured, requests will be unauthenticated".yellow());
    }

    let cache = Arc::new(MemoryCache::with_ttl(cli.cache_ttl()));
    let metrics = Metrics::new().context("failed to register metrics")?;
    let client = GitHubClient::new(tokens, cache, metrics)
        .context("failed to build GitHub client")?
        .with_base_url(&cli.api_url)
        .context("invalid --api-url")?
        .with_page_size(cli.page_size);
    let collector = Arc::new(StarCollector::with_config(Arc::new(client), cli.collector_config()));

    match &cli.command {
        Command::Stars { repo } => print_history(&collector, repo).await,
        Command::Serve { port } => {
            println!("{}", "GitHub Star History Server".bold().green());
            println!("{}\n", "=".repeat(50).dimmed());
            start_server(AppState::new(collector), *port)
                .await
                .context("server stopped")
        }
    }
}

async fn print_history(collector: &StarCollector, full_name: &str) -> anyhow::Result<()> {
    let repo = collector
        .client()
        .get_repository(full_name)
        .await
        .with_context(|| format!("failed to get repository {}", full_name))?;

    println!(
        "{} {}",
        repo.full_name.bold().green(),
        format!("({} stars)", repo.stargazers_count).dimmed()
    );

    let stars = collector
        .collect(&repo)
        .await
        .with_context(|| format!("failed to collect stars for {}", full_name))?;

    for (count, star) in stars.iter().enumerate() {
        println!("{}\t{}", star.starred_at.to_rfc3339(), count + 1);
    }

    Ok(())
}
