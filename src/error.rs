use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::i18n::{Locale, Violation};

/// Stable numeric error codes returned in every error body.
///
/// Clients can rely on these values; HTTP status codes alone do not tell a
/// rate-limited request apart from other 4xx responses.
pub mod codes {
    pub const SERVER_ERROR: u32 = 10_000_000;
    pub const INVALID_PARAMS: u32 = 10_000_001;
    pub const NOT_FOUND: u32 = 10_000_002;
    pub const UNAUTHORIZED_AUTH_NOT_EXIST: u32 = 10_000_003;
    pub const UNAUTHORIZED_TOKEN_ERROR: u32 = 10_000_004;
    pub const UNAUTHORIZED_TOKEN_TIMEOUT: u32 = 10_000_005;
    pub const TOO_MANY_REQUESTS: u32 = 10_000_007;
    pub const DEADLINE_EXCEEDED: u32 = 10_000_008;
    pub const PAYLOAD_TOO_LARGE: u32 = 10_000_009;
}

/// Application-wide error types with appropriate HTTP status codes.
///
/// `TooManyRequests` and `ServerError` are produced by the request pipeline
/// itself; the rest come from handlers and startup.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(Violation),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// A contained panic. Carries no detail on purpose.
    #[error("Server error")]
    ServerError,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status, stable code, error kind and client-safe message.
    fn parts(&self, locale: Locale) -> (StatusCode, u32, &'static str, String) {
        match self {
            AppError::BadRequest(violation) => (
                StatusCode::BAD_REQUEST,
                codes::INVALID_PARAMS,
                "bad_request",
                violation.render(locale),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED_AUTH_NOT_EXIST,
                "unauthorized",
                "Invalid app key or secret.".to_string(),
            ),
            AppError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED_TOKEN_ERROR,
                "invalid_token",
                "Token is missing or invalid.".to_string(),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED_TOKEN_TIMEOUT,
                "token_expired",
                "Token has expired.".to_string(),
            ),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                codes::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Too many requests. Please retry later.".to_string(),
            ),
            AppError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                codes::DEADLINE_EXCEEDED,
                "deadline_exceeded",
                "Request timed out. Please try again.".to_string(),
            ),
            AppError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request body is too large.".to_string(),
            ),
            // Never expose internal details to clients
            AppError::ServerError | AppError::Internal(_) | AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::SERVER_ERROR,
                "server_error",
                "Internal server error.".to_string(),
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts(Locale::En).0
    }

    /// Error body with the client-facing message rendered in `locale`.
    pub fn body(&self, locale: Locale) -> ErrorResponse {
        let (_, code, error_type, message) = self.parts(locale);
        ErrorResponse {
            code,
            error: error_type.to_string(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Full detail stays server side. Rejections are routine and are
        // logged where they happen, not as errors here.
        if status.is_server_error() && !matches!(self, AppError::ServerError) {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = self.body(Locale::En);
        let mut response = (status, axum::Json(body)).into_response();

        // Left for the translations layer to re-render.
        if let AppError::BadRequest(violation) = self {
            response.extensions_mut().insert(violation);
        }

        response
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) = body_of(AppError::Internal("db password=hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, codes::SERVER_ERROR);
        assert!(!body.message.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_too_many_requests_body() {
        let (status, body) = body_of(AppError::TooManyRequests).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.code, codes::TOO_MANY_REQUESTS);
        assert_eq!(body.error, "too_many_requests");
    }

    #[tokio::test]
    async fn test_deadline_exceeded_is_gateway_timeout() {
        let (status, body) = body_of(AppError::DeadlineExceeded).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.code, codes::DEADLINE_EXCEEDED);
    }

    #[tokio::test]
    async fn test_bad_request_keeps_user_facing_message() {
        let (status, body) = body_of(AppError::BadRequest("title too short".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "title too short");
    }

    #[test]
    fn test_bad_request_response_carries_violation() {
        let violation = Violation::IdTooSmall {
            field: "tag_id".to_string(),
        };
        let response = AppError::BadRequest(violation.clone()).into_response();
        assert_eq!(response.extensions().get::<Violation>(), Some(&violation));

        let body = AppError::BadRequest(violation).body(Locale::Zh);
        assert_eq!(body.code, codes::INVALID_PARAMS);
        assert_eq!(body.message, "tag_id 必须大于或等于 1");
    }
}
