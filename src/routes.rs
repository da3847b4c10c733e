//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Recovery     │ ← 500 + operator alert on panic
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 when the route's bucket is empty
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Context Timeout  │ ← attaches RequestDeadline
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Access Log/Trace │ ← access_log record (release) or TraceLayer (debug)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Translations   │ ← 400 messages in the `locale` header's language
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   CORS + Limit   │
//! └────────┬─────────┘
//!          ▼
//!   Token Auth (/api/v1 only) → Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health` - Health check
//! - `/auth` - Token issuance
//! - `/api/v1/tags`, `/api/v1/articles` - Content management (token required)

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RunMode;
use crate::handlers;
use crate::middleware::{
    ContextTimeoutLayer, RateLimitLayer, RecoveryLayer, TokenAuth, TranslationsLayer, access_log,
};
use crate::services::AuthService;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth", post(handlers::issue_token))
        .nest("/api/v1", api_routes(state.auth.clone()))
        .with_state(state.clone());

    apply_pipeline(router, &state)
}

/// Routes of the `/api/v1` group, guarded by token authentication.
fn api_routes(auth: Arc<AuthService>) -> Router<AppState> {
    let token_auth = TokenAuth::new(auth);
    if token_auth.is_enabled() {
        info!("Token authentication enabled on /api/v1");
    } else {
        info!("Token authentication disabled (no APP_SECRET set)");
    }

    Router::new()
        .route("/tags", get(handlers::list_tags).post(handlers::create_tag))
        .route(
            "/tags/{id}",
            put(handlers::update_tag).delete(handlers::delete_tag),
        )
        .route("/tags/{id}/state", patch(handlers::update_tag_state))
        .route(
            "/articles",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route(
            "/articles/{id}",
            get(handlers::get_article)
                .put(handlers::update_article)
                .delete(handlers::delete_article),
        )
        .route("/articles/{id}/state", patch(handlers::update_article_state))
        .route_layer(token_auth)
}

/// Wrap `router` in the request pipeline.
///
/// Layers are applied bottom to top, so the last one added runs first.
pub fn apply_pipeline(router: Router, state: &AppState) -> Router {
    let config = &state.config;

    // 1. Request body size limit for extractors
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );
    let mut router = router
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(build_cors_layer(&config.cors_allowed_origins));

    // 2. Localized validation messages. Inside the audit slot so the access
    //    log records the body the client receives.
    router = router.layer(TranslationsLayer::new());

    // 3. Audit slot
    router = match config.run_mode {
        RunMode::Release => router.layer(from_fn_with_state(
            config.max_request_body_size,
            access_log,
        )),
        RunMode::Debug => router.layer(TraceLayer::new_for_http()),
    };

    // 4. Deadline
    info!(
        timeout_secs = config.default_context_timeout.as_secs(),
        "Request deadline configured"
    );
    router = router.layer(ContextTimeoutLayer::new(config.default_context_timeout));

    // 5. Admission control
    info!(
        rules = state.limiter.rules().len(),
        "Rate limiting configured"
    );
    router = router.layer(RateLimitLayer::new(state.limiter.clone()));

    // 6. Panic containment, outermost
    router.layer(RecoveryLayer::new(state.alerts.clone()))
}

/// Build CORS layer from configuration.
///
/// `*` anywhere in the list allows any origin; otherwise only the listed
/// origins that parse as header values are allowed.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
