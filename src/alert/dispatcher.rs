//! Bounded, fire-and-forget alert dispatch.

use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{AlertEvent, Mailer};
use crate::config::Config;
use crate::metrics;

/// Jitter applied to retry delays (±20%).
const BACKOFF_JITTER_PERCENT: f64 = 0.2;

/// Upper bound for a single retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Upper bound for a single `send_mail` call.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatcher settings, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub recipients: Vec<String>,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub rate_per_minute: u32,
}

impl AlertSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recipients: config.alert_recipients.clone(),
            queue_capacity: config.alert_queue_capacity,
            max_retries: config.alert_max_retries,
            retry_base_delay: config.alert_retry_base_delay,
            rate_per_minute: config.alert_rate_per_minute,
        }
    }
}

/// Handle used by request tasks to enqueue alerts.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Clone)]
pub struct AlertDispatcher {
    sender: mpsc::Sender<AlertEvent>,
    throttle: Arc<DefaultDirectRateLimiter>,
}

impl AlertDispatcher {
    /// Start the delivery worker on `tracker` and return its handle.
    ///
    /// The worker stops when `cancel` fires, after trying each alert that is
    /// still queued once.
    pub fn spawn(
        settings: AlertSettings,
        mailer: Arc<dyn Mailer>,
        tracker: &TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let rate = NonZeroU32::new(settings.rate_per_minute).unwrap_or(NonZeroU32::MIN);
        let throttle = Arc::new(RateLimiter::direct(Quota::per_minute(rate)));

        info!(
            recipients = settings.recipients.len(),
            queue_capacity = settings.queue_capacity,
            max_retries = settings.max_retries,
            rate_per_minute = settings.rate_per_minute,
            "Alert dispatcher started"
        );

        let worker = AlertWorker {
            receiver,
            mailer,
            recipients: settings.recipients,
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay,
        };
        tracker.spawn(worker.run(cancel));

        Self { sender, throttle }
    }

    /// Enqueue an alert without waiting.
    ///
    /// Returns `false` when the alert was dropped (throttled, queue full, or
    /// worker stopped). Never blocks and never fails the caller.
    pub fn notify(&self, event: AlertEvent) -> bool {
        if self.throttle.check().is_err() {
            warn!(path = %event.path, "Alert throttled, dropping");
            metrics::record_alert("throttled");
            return false;
        }

        match self.sender.try_send(event) {
            Ok(()) => {
                metrics::record_alert("queued");
                true
            }
            Err(TrySendError::Full(event)) => {
                warn!(path = %event.path, "Alert queue full, dropping");
                metrics::record_alert("queue_full");
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(path = %event.path, "Alert worker stopped, dropping");
                metrics::record_alert("closed");
                false
            }
        }
    }
}

struct AlertWorker {
    receiver: mpsc::Receiver<AlertEvent>,
    mailer: Arc<dyn Mailer>,
    recipients: Vec<String>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl AlertWorker {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Alert worker received cancellation signal");
                    break;
                }
                event = self.receiver.recv() => match event {
                    Some(event) => self.deliver(&event, self.max_retries, &cancel).await,
                    None => break,
                },
            }
        }

        self.receiver.close();
        while let Ok(event) = self.receiver.try_recv() {
            self.deliver(&event, 0, &cancel).await;
        }

        debug!("Alert worker shutting down");
    }

    /// Send `event`, retrying up to `retries` times.
    ///
    /// Cancellation cuts a pending backoff short and drops the alert.
    async fn deliver(&self, event: &AlertEvent, retries: u32, cancel: &CancellationToken) {
        let subject = event.subject();
        let body = event.body();
        let mut attempt = 0;

        loop {
            let send = self.mailer.send_mail(&self.recipients, &subject, &body);
            // A panicking transport must not take the worker down with it.
            let outcome = tokio::time::timeout(SEND_TIMEOUT, AssertUnwindSafe(send).catch_unwind()).await;

            let error = match outcome {
                Ok(Ok(Ok(()))) => {
                    info!(attempts = attempt + 1, subject = %subject, "Alert sent");
                    metrics::record_alert("sent");
                    return;
                }
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Err(_)) => "mail transport panicked".to_string(),
                Err(_) => format!("send timed out after {SEND_TIMEOUT:?}"),
            };

            if attempt >= retries {
                warn!(
                    error = %error,
                    attempts = attempt + 1,
                    subject = %subject,
                    "Alert delivery failed, giving up"
                );
                metrics::record_alert("failed");
                return;
            }

            let delay = backoff_delay(self.retry_base_delay, attempt);
            warn!(
                error = %error,
                attempt = attempt + 1,
                retry_in_ms = delay.as_millis() as u64,
                "Alert delivery failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(
                        attempts = attempt + 1,
                        subject = %subject,
                        "Alert retries abandoned on shutdown"
                    );
                    metrics::record_alert("failed");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Exponential backoff with jitter: `base * 2^attempt`, ±20%, capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    use rand::Rng;

    let exp = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter = 1.0 + BACKOFF_JITTER_PERCENT * (2.0 * rand::rng().random::<f64>() - 1.0);
    exp.mul_f64(jitter).min(MAX_RETRY_DELAY)
}
