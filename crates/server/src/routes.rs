//! HTTP routes: metrics scrape, asset lookup API and health check

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use overwatch_collector::QueryService;
use overwatch_core::{Asset, QueryError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            start_time: Instant::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub assets: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Lookup failure mapped onto an HTTP status
pub struct ApiError(QueryError);

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

pub fn build_router(query: QueryService) -> Router {
    let state = AppState::new(query);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/api/entities", get(list_handler))
        .route("/api/entities/{id}", get(asset_handler))
        // Paths served by earlier releases
        .route("/api/coins", get(list_handler))
        .route("/api/coins/{id}", get(asset_handler))
        .with_state(state)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.query.metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.query.metrics_content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/entities
async fn list_handler(State(state): State<AppState>) -> Json<Vec<Asset>> {
    Json(state.query.list())
}

/// GET /api/entities/{id}
async fn asset_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Asset>, ApiError> {
    Ok(Json(state.query.get(&id)?))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: crate::VERSION,
        uptime_secs: state.start_time.elapsed().as_secs(),
        assets: state.query.asset_count(),
        last_refresh: state.query.last_refresh(),
    })
}
