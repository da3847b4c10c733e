//! HTTP middleware forming the request pipeline.
//!
//! - **Recovery**: contains handler panics, answers with a generic 500, alerts operators
//! - **Rate Limiting**: per-route token buckets, 429 when a bucket is empty
//! - **Context Timeout**: per-request deadline with cooperative cancellation
//! - **Access Log**: one structured record per request with both bodies
//! - **Translations**: validation messages in the client's `locale`
//! - **Token Auth**: access token check on the `/api/v1` group
//!
//! # Architecture
//!
//! ```text
//! Request → Recovery → Rate Limiter → Context Timeout → Access Log → Translations → Handler
//!              ↓            ↓                ↓                ↓              ↓
//!         500 on panic  429 Too Many   RequestDeadline   access_log     localized 400
//! ```

pub mod access_log;
pub mod auth;
pub mod rate_limit;
pub mod recovery;
pub mod timeout;
pub mod translations;

pub use access_log::access_log;
pub use auth::TokenAuth;
pub use rate_limit::RateLimitLayer;
pub use recovery::{RecoveryLayer, install_panic_hook};
pub use timeout::{
    ContextTimeoutLayer, MIN_REQUEST_TIMEOUT_MS, REQUEST_TIMEOUT_HEADER, RequestDeadline,
};
pub use translations::TranslationsLayer;
