//! Operator alerts for contained request failures.
//!
//! # Flow
//!
//! ```text
//! Recovery middleware ──notify()──► bounded queue ──► AlertWorker ──► Mailer
//!        (never blocks)               (drop if full)    (retry with backoff)
//! ```
//!
//! Alerting is strictly best effort. A full queue, a throttled burst or a
//! failing mail transport is logged and counted, and never reaches the
//! request that triggered the alert.

mod dispatcher;
mod mailer;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use dispatcher::{AlertDispatcher, AlertSettings};
pub use mailer::{LogMailer, Mailer};

/// Source location of a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanicLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for PanicLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A contained failure, as reported to operators.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    /// Panic payload rendered as text
    pub message: String,
    /// Where the panic was raised, when known
    pub location: Option<PanicLocation>,
    pub method: String,
    pub path: String,
    pub occurred_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(
        message: impl Into<String>,
        location: Option<PanicLocation>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            location,
            method: method.into(),
            path: path.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> String {
        format!("Panic recovered at {}", self.occurred_at.timestamp())
    }

    pub fn body(&self) -> String {
        let location = self
            .location
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);

        format!(
            "Error: {}\nLocation: {}\nRequest: {} {}\nTime: {}\n",
            self.message,
            location,
            self.method,
            self.path,
            self.occurred_at.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_body_contains_request_and_location() {
        let event = AlertEvent::new(
            "index out of bounds",
            Some(PanicLocation {
                file: "src/handlers/articles.rs".to_string(),
                line: 42,
                column: 9,
            }),
            "GET",
            "/api/v1/articles/7",
        );

        let body = event.body();
        assert!(body.contains("index out of bounds"));
        assert!(body.contains("src/handlers/articles.rs:42:9"));
        assert!(body.contains("GET /api/v1/articles/7"));
        assert!(event.subject().starts_with("Panic recovered at "));
    }

    #[test]
    fn test_alert_body_without_location() {
        let event = AlertEvent::new("boom", None, "POST", "/auth");
        assert!(event.body().contains("Location: unknown"));
    }
}
