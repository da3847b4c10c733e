//! Panic containment for the request pipeline.
//!
//! Everything below this layer runs inside a per-request unwind trap. A panic
//! in a handler, an extractor or another layer becomes the fixed generic 500
//! response, is logged with its source location, and is reported to
//! operators through the [`AlertDispatcher`] when alerting is enabled.
//!
//! Containment relies on unwinding, so the crate must not be built with
//! `panic = "abort"`.

use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use futures::FutureExt;
use tower::{Layer, Service};
use tracing::{error, warn};

use crate::alert::{AlertDispatcher, AlertEvent, PanicLocation};
use crate::error::AppError;
use crate::metrics;

thread_local! {
    /// Location of the most recent panic on this thread, set by the hook.
    static LAST_PANIC_LOCATION: RefCell<Option<PanicLocation>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Install the process-wide hook that records panic locations.
///
/// Idempotent. The previously installed hook still runs afterwards.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map(|l| PanicLocation {
                file: l.file().to_string(),
                line: l.line(),
                column: l.column(),
            });
            LAST_PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            previous(info);
        }));
    });
}

/// The unwind is caught on the thread that panicked, inside the same poll,
/// so the slot still holds this panic's location.
fn take_panic_location() -> Option<PanicLocation> {
    LAST_PANIC_LOCATION.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Layer converting downstream panics into `500 Internal Server Error`.
#[derive(Clone)]
pub struct RecoveryLayer {
    alerts: Option<AlertDispatcher>,
}

impl RecoveryLayer {
    /// `alerts` is `None` when alerting is disabled; panics are then only logged.
    pub fn new(alerts: Option<AlertDispatcher>) -> Self {
        install_panic_hook();
        Self { alerts }
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService {
            inner,
            alerts: self.alerts.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
    alerts: Option<AlertDispatcher>,
}

impl<S> Service<Request<Body>> for RecoveryService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let alerts = self.alerts.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // `inner.call` runs inside the trap too; services may panic before
            // returning their future.
            let downstream = AssertUnwindSafe(async move { inner.call(req).await });

            match downstream.catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let location = take_panic_location();
                    Ok(recover(message, location, method, path, alerts.as_ref()))
                }
            }
        })
    }
}

fn recover(
    message: String,
    location: Option<PanicLocation>,
    method: String,
    path: String,
    alerts: Option<&AlertDispatcher>,
) -> Response<Body> {
    let at = location
        .as_ref()
        .map_or_else(|| "unknown".to_string(), ToString::to_string);

    error!(
        panic = %message,
        location = %at,
        method = %method,
        path = %path,
        "Recovered from panic in request handler"
    );
    metrics::record_panic_recovered();

    if let Some(alerts) = alerts
        && !alerts.notify(AlertEvent::new(message, location, method, path))
    {
        warn!("Panic alert was not queued");
    }

    AppError::ServerError.into_response()
}
