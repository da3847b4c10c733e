//! Shared application state for Axum handlers and middleware.
//!
//! Holds the configuration, the rate limiter registry, the services and the
//! optional alert dispatcher. Everything is behind `Arc` or is itself a cheap
//! handle, so cloning per request is inexpensive.
//!
//! # Structured Concurrency
//!
//! The alert worker runs on a `tokio_util::task::TaskTracker` and stops on a
//! `CancellationToken`. Call `shutdown()` after the server stops accepting
//! requests to let it drain.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::alert::{AlertDispatcher, AlertSettings, LogMailer, Mailer};
use crate::config::Config;
use crate::limiter::MethodLimiter;
use crate::services::{AuthService, ContentService};

/// Shared application state.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config);
/// // ... serve ...
/// state.shutdown().await;  // Drain queued alerts
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Token bucket registry used by the rate limiting layer
    pub limiter: Arc<MethodLimiter>,
    pub content: Arc<ContentService>,
    pub auth: Arc<AuthService>,
    /// Present only when alerting is enabled
    pub alerts: Option<AlertDispatcher>,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build state with the default [`LogMailer`] alert transport.
    pub fn new(config: Config) -> Self {
        Self::with_mailer(config, Arc::new(LogMailer))
    }

    /// Build state with a custom mail transport for alerts.
    ///
    /// The alert worker is only spawned when alerting is enabled.
    pub fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let task_tracker = TaskTracker::new();
        let cancellation_token = CancellationToken::new();

        let limiter = MethodLimiter::new().with_rules(config.rate_limit_rules.iter().cloned());

        let alerts = if config.alerting_enabled() {
            Some(AlertDispatcher::spawn(
                AlertSettings::from_config(&config),
                mailer,
                &task_tracker,
                cancellation_token.clone(),
            ))
        } else {
            info!(run_mode = %config.run_mode, "Operator alerts disabled");
            None
        };

        Self {
            auth: Arc::new(AuthService::from_config(&config)),
            content: Arc::new(ContentService::new()),
            limiter: Arc::new(limiter),
            alerts,
            started_at: Instant::now(),
            config: Arc::new(config),
            task_tracker,
            cancellation_token,
        }
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
