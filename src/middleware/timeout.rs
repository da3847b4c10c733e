//! Request deadline propagation.
//!
//! Every request gets a [`RequestDeadline`] in its extensions: an absolute
//! expiry plus a cancellation token that fires at that expiry.
//!
//! # Cooperative Cancellation
//!
//! The middleware never aborts the downstream future. At expiry it only
//! cancels the token; a handler that never looks at the deadline runs to
//! completion. Handlers opt in:
//!
//! ```rust,ignore
//! async fn handler(Extension(deadline): Extension<RequestDeadline>) -> AppResult<Json<T>> {
//!     let data = deadline.run(service.load()).await?; // 504 on expiry
//!     Ok(Json(data))
//! }
//! ```
//!
//! # Client Override
//!
//! Clients may shorten (never extend) the budget with `X-Request-Timeout`
//! in milliseconds:
//! ```text
//! X-Request-Timeout: 5000
//! ```
//! Values below 100ms or above the configured budget are ignored.

use std::future::Future;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Minimum accepted client-specified timeout (100ms).
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

/// Header name for client-specified request timeout.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout";

/// Deadline attached to a single request.
///
/// Cloning shares the same cancellation token.
#[derive(Debug, Clone)]
pub struct RequestDeadline {
    expires_at: Instant,
    budget: Duration,
    token: CancellationToken,
}

impl RequestDeadline {
    /// Deadline expiring `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
            token: CancellationToken::new(),
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Total budget the request was given.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// True once the deadline has passed. Also true after the request has
    /// finished, since the token is released at that point.
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// Resolves once the deadline has passed or the request has finished.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Run `fut` unless the deadline fires first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::DeadlineExceeded` if the deadline fires before
    /// `fut` completes. `fut` is dropped in that case.
    pub async fn run<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = T>,
    {
        if self.is_expired() {
            return Err(AppError::DeadlineExceeded);
        }

        tokio::select! {
            biased;

            output = fut => Ok(output),
            _ = self.token.cancelled() => {
                debug!(budget_ms = self.budget.as_millis() as u64, "Request deadline exceeded");
                Err(AppError::DeadlineExceeded)
            }
        }
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Layer attaching a [`RequestDeadline`] to every request.
#[derive(Debug, Clone, Copy)]
pub struct ContextTimeoutLayer {
    timeout: Duration,
}

impl ContextTimeoutLayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for ContextTimeoutLayer {
    type Service = ContextTimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextTimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextTimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<Request<Body>> for ContextTimeoutService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let budget = client_timeout(&req, self.timeout).unwrap_or(self.timeout);
        let deadline = RequestDeadline::after(budget);
        req.extensions_mut().insert(deadline.clone());

        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Releases the token however the request ends, including when the
            // response future is dropped.
            let _release = deadline.token().clone().drop_guard();

            let response = inner.call(req);
            tokio::pin!(response);

            let expiry = tokio::time::sleep_until(deadline.expires_at());
            tokio::pin!(expiry);
            let mut fired = false;

            loop {
                tokio::select! {
                    biased;

                    result = &mut response => return result,
                    _ = &mut expiry, if !fired => {
                        fired = true;
                        deadline.token().cancel();
                        warn!(budget_ms = budget.as_millis() as u64, "Request deadline reached");
                    }
                }
            }
        })
    }
}

/// Client-requested budget from `X-Request-Timeout`, if valid and not longer
/// than `max`.
fn client_timeout<B>(req: &Request<B>, max: Duration) -> Option<Duration> {
    let value = req.headers().get(REQUEST_TIMEOUT_HEADER)?;

    let Some(ms) = value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) else {
        debug!(value = ?value, "Invalid X-Request-Timeout header value, ignoring");
        return None;
    };

    let requested = Duration::from_millis(ms);
    if ms < MIN_REQUEST_TIMEOUT_MS || requested > max {
        debug!(
            timeout_ms = ms,
            min = MIN_REQUEST_TIMEOUT_MS,
            max = max.as_millis() as u64,
            "Client timeout outside allowed range, ignoring"
        );
        return None;
    }

    debug!(timeout_ms = ms, "Client specified request timeout via header");
    Some(requested)
}
