//! Fuzz target for rate limit rule parsing.
//!
//! `parse_rules` reads operator-supplied configuration. Any accepted rule
//! must yield a bucket that can be drawn from without panicking.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_rules -- -max_total_time=60
//! ```

#![no_main]

use blog_service::limiter::{MethodLimiter, parse_rules};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(spec) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(rules) = parse_rules(spec) {
        let limiter = MethodLimiter::new().with_rules(rules.clone());
        for rule in &rules {
            if let Some(bucket) = limiter.get_bucket(rule.key()) {
                let _ = bucket.take(1);
                let _ = bucket.time_to_refill();
            }
        }
    }
});
