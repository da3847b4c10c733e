//! Bucket registry: ordered rules plus one lazily created bucket per rule.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::{BucketRule, TokenBucket};

/// Owns the rate limiting rules and the buckets materialized for them.
///
/// Every path matched by a rule draws from that rule's single bucket, so
/// `/api/v1/articles/1` and `/api/v1/articles/2` share one budget. The map
/// can never hold more entries than there are rules.
///
/// # Concurrency
///
/// Lookups take a shared read lock. Creation takes the write lock and checks
/// again before inserting, so two requests racing on a new rule always end up
/// sharing one bucket. Token accounting happens under each bucket's own lock.
#[derive(Debug, Default)]
pub struct MethodLimiter {
    rules: Vec<BucketRule>,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl MethodLimiter {
    /// Create a limiter with no rules (every key is unlimited).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Rules are matched in registration order.
    ///
    /// Rules can only be added while the limiter is exclusively owned, i.e.
    /// before it is shared with the middleware.
    pub fn add_rule(&mut self, rule: BucketRule) -> &mut Self {
        info!(
            prefix = rule.key(),
            fill_interval_ms = rule.fill_interval().as_millis() as u64,
            capacity = rule.capacity(),
            quantum = rule.quantum(),
            "Rate limit rule registered"
        );
        self.rules.push(rule);
        self
    }

    /// Builder-style variant of [`add_rule`](Self::add_rule).
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = BucketRule>) -> Self {
        for rule in rules {
            self.add_rule(rule);
        }
        self
    }

    pub fn rules(&self) -> &[BucketRule] {
        &self.rules
    }

    /// First registered rule whose prefix matches `key`.
    pub fn rule_for(&self, key: &str) -> Option<&BucketRule> {
        self.rules.iter().find(|rule| rule.matches(key))
    }

    /// Number of buckets currently resident.
    pub fn bucket_count(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Bucket governing `key`, created on first use of its rule.
    ///
    /// Returns `None` when no rule matches, meaning the key is not limited.
    pub fn get_bucket(&self, key: &str) -> Option<Arc<TokenBucket>> {
        let rule = self.rule_for(key)?;
        let prefix = rule.key();

        {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = buckets.get(prefix) {
                return Some(Arc::clone(bucket));
            }
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        // Another request may have created it between the two locks.
        if let Some(bucket) = buckets.get(prefix) {
            return Some(Arc::clone(bucket));
        }

        let bucket = Arc::new(rule.new_bucket());
        buckets.insert(prefix.to_string(), Arc::clone(&bucket));
        debug!(key, prefix, "Token bucket created");
        crate::metrics::set_token_buckets(buckets.len());

        Some(bucket)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn auth_rule() -> BucketRule {
        BucketRule::new("/auth", Duration::from_secs(1), 10, 10).unwrap()
    }

    #[test]
    fn test_unmatched_key_has_no_bucket() {
        let limiter = MethodLimiter::new().with_rules([auth_rule()]);
        assert!(limiter.get_bucket("/api/v1/tags").is_none());
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_same_key_returns_same_bucket() {
        let limiter = MethodLimiter::new().with_rules([auth_rule()]);
        let a = limiter.get_bucket("/auth").unwrap();
        let b = limiter.get_bucket("/auth").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_keys_under_one_rule_share_its_bucket() {
        let limiter = MethodLimiter::new().with_rules([auth_rule()]);
        let a = limiter.get_bucket("/auth").unwrap();
        let b = limiter.get_bucket("/auth/refresh").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_path_parameters_cannot_multiply_the_budget() {
        let limiter = MethodLimiter::new().with_rules([BucketRule::new(
            "/api/v1/articles",
            Duration::from_secs(60),
            1,
            1,
        )
        .unwrap()]);

        let admitted = (1..=50)
            .filter(|id| {
                let bucket = limiter.get_bucket(&format!("/api/v1/articles/{id}")).unwrap();
                bucket.take(1) == 1
            })
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let limiter = MethodLimiter::new().with_rules([
            BucketRule::new("/api/", Duration::from_secs(1), 5, 5).unwrap(),
            BucketRule::new("/api/v1/", Duration::from_secs(1), 50, 50).unwrap(),
        ]);
        let bucket = limiter.get_bucket("/api/v1/tags").unwrap();
        assert_eq!(bucket.capacity(), 5);
        assert_eq!(limiter.rule_for("/api/v1/tags").unwrap().key(), "/api/");
    }

    #[test]
    fn test_registry_is_bounded_by_rule_count() {
        let limiter = MethodLimiter::new().with_rules([
            BucketRule::new("/auth", Duration::from_secs(1), 1, 1).unwrap(),
            BucketRule::new("/", Duration::from_secs(1), 1, 1).unwrap(),
        ]);

        for i in 0..100 {
            limiter.get_bucket(&format!("/page/{i}")).unwrap();
        }
        limiter.get_bucket("/auth").unwrap();

        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_exhausted_bucket_stays_exhausted_while_other_keys_are_used() {
        let limiter = MethodLimiter::new().with_rules([
            BucketRule::new("/auth", Duration::from_secs(60), 2, 2).unwrap(),
            BucketRule::new("/", Duration::from_secs(60), 1000, 1000).unwrap(),
        ]);

        let auth = limiter.get_bucket("/auth").unwrap();
        assert_eq!(auth.take(2), 2);

        for i in 0..50 {
            limiter.get_bucket(&format!("/other/{i}")).unwrap().take(1);
        }

        let again = limiter.get_bucket("/auth").unwrap();
        assert!(Arc::ptr_eq(&auth, &again));
        assert_eq!(again.take(1), 0);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_bucket() {
        let limiter = Arc::new(MethodLimiter::new().with_rules([auth_rule()]));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    limiter.get_bucket("/auth").unwrap()
                })
            })
            .collect();

        let buckets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = &buckets[0];
        assert!(buckets.iter().all(|b| Arc::ptr_eq(first, b)));
        assert_eq!(limiter.bucket_count(), 1);
    }
}
