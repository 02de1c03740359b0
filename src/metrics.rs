use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::error::{Result, StarHistoryError};

/// Counters for cache effectiveness and upstream rate limiting.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    effective_etags: IntCounter,
    rate_limits: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let effective_etags = IntCounter::new(
            "starhistory_effective_etags_total",
            "Stargazer pages served from cache after a 304 Not Modified.",
        )
        .map_err(metrics_error)?;
        let rate_limits = IntCounter::new(
            "starhistory_rate_limits_total",
            "GitHub requests rejected by the API rate limit.",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(effective_etags.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(rate_limits.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            effective_etags,
            rate_limits,
        })
    }

    pub fn inc_effective_etag(&self) {
        self.effective_etags.inc();
    }

    pub fn inc_rate_limit(&self) {
        self.rate_limits.inc();
    }

    pub fn effective_etags(&self) -> u64 {
        self.effective_etags.get()
    }

    pub fn rate_limits(&self) -> u64 {
        self.rate_limits.get()
    }

    /// Prometheus text exposition of all registered counters.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer)
            .map_err(|e| StarHistoryError::MetricsError(format!("output is not utf-8: {}", e)))
    }
}

fn metrics_error(err: prometheus::Error) -> StarHistoryError {
    StarHistoryError::MetricsError(err.to_string())
}
