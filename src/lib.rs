//! # Blog Service
//!
//! A content management API for tags and articles, served by Axum behind a
//! request pipeline that keeps one misbehaving client or handler from
//! hurting everybody else:
//!
//! - **Admission control**: per-route token buckets, `429` when a bucket is empty
//! - **Deadlines**: every request carries a cooperative [`RequestDeadline`]
//! - **Panic containment**: a panicking handler yields a generic `500`, the
//!   server keeps serving, and operators get an alert
//! - **Audit**: one structured access-log record per request
//! - **Translations**: validation messages in English or Chinese, per the
//!   `locale` request header
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Recovery → Rate Limit → Timeout → Access Log → Translations│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, auth, tags, articles) + Token Auth       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (AuthService, ContentService)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Background: AlertDispatcher worker (TaskTracker)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blog_service::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config);
//!     let app = build_router(state.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     state.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Rate Limit Rules
//!
//! ```bash
//! RATE_LIMIT_RULES="/auth:1000:10:10,/api/v1/articles:1000:100:100" cargo run
//! ```

pub mod alert;
pub mod config;
pub mod error;
pub mod handlers;
pub mod i18n;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::{Config, RunMode};
pub use error::{AppError, AppResult};
pub use limiter::{BucketRule, MethodLimiter, TokenBucket};
pub use middleware::RequestDeadline;
pub use routes::{apply_pipeline, build_router};
pub use state::AppState;
