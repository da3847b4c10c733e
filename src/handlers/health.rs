//! Health endpoint.
//!
//! `GET /health` sits outside the `/api/v1` group, so it never needs a token.
//! It still passes through the rate limiter and deadline layers like every
//! other route.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "run_mode": "release",
///   "uptime_seconds": 3600,
///   "token_buckets": 12,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        run_mode: state.config.run_mode.to_string(),
        uptime_seconds: state.uptime_seconds(),
        token_buckets: state.limiter.bucket_count(),
        timestamp: Utc::now(),
    })
}
