//! Mail transport seam for operator alerts.

use async_trait::async_trait;
use tracing::error;

/// Outbound mail transport.
///
/// Implementations must be safe to call from the alert worker while requests
/// keep arriving; the worker calls one `send_mail` at a time.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Deliver one message to every recipient.
    async fn send_mail(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Mailer that writes alerts to the log on the `alert` target.
///
/// Used when no mail transport is plugged in, so alerts still reach whatever
/// collects the service's logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        error!(
            target: "alert",
            recipients = %to.join(","),
            subject,
            body,
            "Operator alert"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let to = vec!["ops@example.com".to_string()];
        assert!(LogMailer.send_mail(&to, "subject", "body").await.is_ok());
    }
}
