use crate::collector::StarCollector;
use crate::error::{Result, StarHistoryError};
use crate::types::Stargazer;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub tokens: TokenHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHealth {
    pub configured: usize,
    pub valid: usize,
}

/// Liveness check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StarsResponse {
    pub full_name: String,
    pub stargazers_count: u32,
    pub stars: Vec<Stargazer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<StarCollector>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(collector: Arc<StarCollector>) -> Self {
        Self {
            collector,
            start_time: Instant::now(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/livez", get(liveness_check))
        .route("/metrics", get(metrics))
        .route("/repos/:owner/:name/stars", get(repo_stars))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Star history server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Unhealthy once every configured token has been rejected.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.collector.client().tokens();
    let tokens = TokenHealth {
        configured: pool.len(),
        valid: pool.valid_count(),
    };
    let status = if tokens.configured > 0 && tokens.valid == 0 {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    };
    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tokens,
    };

    (status_code, Json(response))
}

async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "alive".to_string(),
        }),
    )
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.collector.client().metrics().render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            error_response(&e).into_response()
        }
    }
}

async fn repo_stars(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    let full_name = format!("{}/{}", owner, name);
    let client = state.collector.client();

    let repo = match client.get_repository(&full_name).await {
        Ok(repo) => repo,
        Err(e) => {
            warn!(repo = %full_name, error = %e, "failed to get repository");
            return error_response(&e).into_response();
        }
    };

    match state.collector.collect(&repo).await {
        Ok(stars) => Json(StarsResponse {
            full_name: repo.full_name,
            stargazers_count: repo.stargazers_count,
            stars,
        })
        .into_response(),
        Err(e) => {
            warn!(repo = %full_name, error = %e, "failed to collect stars");
            error_response(&e).into_response()
        }
    }
}

fn error_response(err: &StarHistoryError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        StarHistoryError::InvalidRepoName(_) => StatusCode::BAD_REQUEST,
        StarHistoryError::NotFound(_) => StatusCode::NOT_FOUND,
        StarHistoryError::TooManyStars { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StarHistoryError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        StarHistoryError::NoValidTokens => StatusCode::SERVICE_UNAVAILABLE,
        StarHistoryError::MetricsError(_) | StarHistoryError::IoError(_) | StarHistoryError::TaskFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        StarHistoryError::ApiError(_) | StarHistoryError::NetworkError(_) | StarHistoryError::JsonError(_) => {
            StatusCode::BAD_GATEWAY
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
