//! Token bucket with lazy, interval-based refill.
//!
//! # Algorithm
//!
//! A bucket starts full. Tokens are not added by a background timer; every
//! access first credits `floor(elapsed / fill_interval) * quantum` tokens
//! (capped at capacity) and moves the refill timestamp forward by exactly the
//! whole intervals consumed. Fractional progress toward the next interval is
//! kept, so refills never drift.
//!
//! ```text
//! last_refill          +1 interval          +2 intervals   now
//!     |---------------------|---------------------|---------.
//!                                                 ^ new last_refill
//! ```
//!
//! Withdrawals are all-or-nothing and never block.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::LimiterError;

/// Mutable bucket counters, guarded by the bucket's own lock.
#[derive(Debug)]
struct BucketState {
    /// Tokens currently available, always in `0..=capacity`.
    tokens: u64,
    /// Start of the interval that is currently filling.
    last_refill: Instant,
}

/// A single rate-limited counter.
///
/// Each bucket carries its own mutex so that unrelated rules never contend.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    quantum: u64,
    fill_interval: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError` if any parameter is zero.
    pub fn new(fill_interval: Duration, capacity: u64, quantum: u64) -> Result<Self, LimiterError> {
        if fill_interval.is_zero() {
            return Err(LimiterError::ZeroFillInterval);
        }
        if capacity == 0 {
            return Err(LimiterError::ZeroCapacity);
        }
        if quantum == 0 {
            return Err(LimiterError::ZeroQuantum);
        }
        Ok(Self::with_params(fill_interval, capacity, quantum))
    }

    /// Build a full bucket from parameters that were already validated.
    pub(super) fn with_params(fill_interval: Duration, capacity: u64, quantum: u64) -> Self {
        let now = Instant::now();
        Self {
            capacity,
            quantum,
            fill_interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens credited per elapsed fill interval.
    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Duration between refills.
    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    /// Attempt to withdraw `n` tokens.
    ///
    /// Returns `n` when the withdrawal succeeded and `0` when fewer than `n`
    /// tokens are available. A request for zero tokens always returns zero.
    pub fn take(&self, n: u64) -> u64 {
        let now = Instant::now();
        let mut state = self.lock();
        self.refill(&mut state, now);

        if n == 0 || state.tokens < n {
            return 0;
        }
        state.tokens -= n;
        n
    }

    /// Tokens available right now (after crediting any elapsed intervals).
    pub fn available(&self) -> u64 {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Time until the next whole fill interval completes.
    pub fn time_to_refill(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.lock();
        self.refill(&mut state, now);
        let next = state.last_refill + self.fill_interval;
        next.saturating_duration_since(now)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let intervals = elapsed.as_nanos() / self.fill_interval.as_nanos();
        if intervals == 0 {
            return;
        }

        let credit = intervals.saturating_mul(u128::from(self.quantum));
        let missing = u128::from(self.capacity - state.tokens);
        // credit.min(missing) <= capacity, which fits in u64
        state.tokens += u64::try_from(credit.min(missing)).unwrap_or(0);

        // Advance by whole intervals only, keeping the fractional remainder.
        let advance = u32::try_from(intervals)
            .ok()
            .and_then(|i| self.fill_interval.checked_mul(i));
        state.last_refill = match advance {
            Some(step) => state.last_refill + step,
            // Idle for longer than u32::MAX intervals; the remainder is irrelevant.
            None => now,
        };
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // Counters are consistent after every critical section, so a poisoned
        // lock still holds valid state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
