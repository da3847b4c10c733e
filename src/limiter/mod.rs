//! Per-route token bucket rate limiting primitives.
//!
//! - [`TokenBucket`] - a single counter with lazy refill
//! - [`BucketRule`] - key prefix plus bucket parameters, fixed at startup
//! - [`MethodLimiter`] - ordered rules and the lazily populated bucket map
//!
//! The HTTP side lives in [`crate::middleware::rate_limit`].

mod bucket;
mod registry;

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub use bucket::TokenBucket;
pub use registry::MethodLimiter;

/// Errors raised while building rules or buckets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimiterError {
    #[error("fill interval must be greater than zero")]
    ZeroFillInterval,

    #[error("bucket capacity must be greater than zero")]
    ZeroCapacity,

    #[error("bucket quantum must be greater than zero")]
    ZeroQuantum,

    #[error("rule key prefix must start with '/': {0:?}")]
    InvalidPrefix(String),

    #[error("malformed rate limit rule {0:?}, expected prefix:fill_ms:capacity:quantum")]
    MalformedRule(String),
}

/// A rate limiting rule, matched against request paths by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRule {
    key: String,
    fill_interval: Duration,
    capacity: u64,
    quantum: u64,
}

impl BucketRule {
    /// Create a validated rule.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError` if the prefix does not start with `/` or any
    /// numeric parameter is zero.
    pub fn new(
        key: impl Into<String>,
        fill_interval: Duration,
        capacity: u64,
        quantum: u64,
    ) -> Result<Self, LimiterError> {
        let key = key.into();
        if !key.starts_with('/') {
            return Err(LimiterError::InvalidPrefix(key));
        }
        if fill_interval.is_zero() {
            return Err(LimiterError::ZeroFillInterval);
        }
        if capacity == 0 {
            return Err(LimiterError::ZeroCapacity);
        }
        if quantum == 0 {
            return Err(LimiterError::ZeroQuantum);
        }

        Ok(Self {
            key,
            fill_interval,
            capacity,
            quantum,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Whether this rule governs `path`.
    ///
    /// Matching respects path segments: `/auth` matches `/auth` and
    /// `/auth/refresh` but not `/authors`. A prefix ending in `/` matches
    /// everything below it.
    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.key.as_str()) {
            Some("") => true,
            Some(rest) => self.key.ends_with('/') || rest.starts_with('/'),
            None => false,
        }
    }

    /// Build a fresh, full bucket with this rule's parameters.
    pub(crate) fn new_bucket(&self) -> TokenBucket {
        TokenBucket::with_params(self.fill_interval, self.capacity, self.quantum)
    }
}

/// Parses `prefix:fill_ms:capacity:quantum`, e.g. `/auth:1000:10:10`.
///
/// The prefix is split off last, so it may itself contain `:`.
impl FromStr for BucketRule {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LimiterError::MalformedRule(s.to_string());

        let mut parts = s.trim().rsplitn(4, ':');
        let quantum = parts.next().ok_or_else(malformed)?;
        let capacity = parts.next().ok_or_else(malformed)?;
        let fill_ms = parts.next().ok_or_else(malformed)?;
        let key = parts.next().ok_or_else(malformed)?;

        let fill_ms: u64 = fill_ms.trim().parse().map_err(|_| malformed())?;
        let capacity: u64 = capacity.trim().parse().map_err(|_| malformed())?;
        let quantum: u64 = quantum.trim().parse().map_err(|_| malformed())?;

        Self::new(key.trim(), Duration::from_millis(fill_ms), capacity, quantum)
    }
}

/// Parse a comma-separated rule list. Empty entries are skipped.
///
/// # Errors
///
/// Returns the first rule that fails to parse.
pub fn parse_rules(spec: &str) -> Result<Vec<BucketRule>, LimiterError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
