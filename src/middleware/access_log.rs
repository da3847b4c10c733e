//! Request/response audit log.
//!
//! Buffers both bodies so a single record on the `access_log` target carries
//! the method, path, status, bodies and timing of the exchange. Bytes, status
//! and headers reach the client unchanged.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::AppError;
use crate::metrics;

/// Access log middleware, for use with `axum::middleware::from_fn_with_state`.
///
/// `body_limit` bounds the captured request body. A larger body is rejected
/// with `413 Payload Too Large` before the handler runs, and the rejection is
/// logged like any other exchange.
pub async fn access_log(State(body_limit): State<usize>, req: Request, next: Next) -> Response {
    let begin = Utc::now();
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (parts, body) = req.into_parts();
    let (request_body, response) = match axum::body::to_bytes(body, body_limit).await {
        Ok(bytes) => {
            let req = Request::from_parts(parts, Body::from(bytes.clone()));
            (bytes, next.run(req).await)
        }
        Err(e) => {
            warn!(method = %method, path = %path, error = %e, "Request body rejected");
            (
                Bytes::new(),
                AppError::PayloadTooLarge(body_limit).into_response(),
            )
        }
    };

    let (parts, body) = response.into_parts();
    let response_body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::Internal(format!("failed to buffer response body: {e}"))
                .into_response();
        }
    };

    let end = Utc::now();
    let elapsed = start.elapsed();
    let status = parts.status.as_u16();

    info!(
        target: "access_log",
        method = %method,
        path = %path,
        status,
        request_body = %lossy(&request_body),
        response_body = %lossy(&response_body),
        begin_time = %begin.to_rfc3339(),
        end_time = %end.to_rfc3339(),
        latency_ms = elapsed.as_millis() as u64,
        "access log"
    );
    metrics::record_request_duration(method.as_str(), status, elapsed.as_secs_f64());

    Response::from_parts(parts, Body::from(response_body))
}

fn lossy(bytes: &Bytes) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
