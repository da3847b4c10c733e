//! Per-route admission control backed by [`MethodLimiter`].
//!
//! # Key Derivation
//!
//! The key is the request path without its query string. Rules are matched by
//! prefix in registration order and every path a rule claims draws from that
//! rule's bucket. A path no rule claims is never limited.
//!
//! # Response Headers
//!
//! On rejection (429):
//! - `Retry-After`: seconds until the bucket's next refill (at least 1)
//! - `X-RateLimit-Limit`: bucket capacity
//! - `X-RateLimit-Remaining`: always `0`

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;
use crate::limiter::MethodLimiter;
use crate::metrics;

/// Rate limiting layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = MethodLimiter::new().with_rules(config.rate_limit_rules.clone());
/// let app = Router::new()
///     .route("/auth", post(handler))
///     .layer(RateLimitLayer::new(Arc::new(limiter)));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<MethodLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<MethodLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<MethodLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let key = req.uri().path();

            let Some(bucket) = limiter.get_bucket(key) else {
                return inner.call(req).await;
            };

            if bucket.take(1) == 1 {
                return inner.call(req).await;
            }

            let retry_after = bucket.time_to_refill().as_secs_f64().ceil().max(1.0) as u64;
            let route = limiter.rule_for(key).map_or(key, |rule| rule.key());

            warn!(
                path = %key,
                rule = %route,
                retry_after_secs = retry_after,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(route);

            Ok(too_many_requests(retry_after, bucket.capacity()))
        })
    }
}

fn too_many_requests(retry_after: u64, limit: u64) -> Response<Body> {
    let mut response = AppError::TooManyRequests.into_response();
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(retry_after));
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use axum::http::StatusCode;
    use tower::ServiceExt;
    use tower::service_fn;

    use super::*;
    use crate::limiter::BucketRule;

    fn limited_service(
        rule: &str,
    ) -> impl Service<Request<Body>, Response = Response<Body>, Error = Infallible> + Clone {
        let limiter = MethodLimiter::new().with_rules([rule.parse::<BucketRule>().unwrap()]);
        let ok = service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from("ok")))
        });
        RateLimitLayer::new(Arc::new(limiter)).layer(ok)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_once_bucket_is_empty() {
        let svc = limited_service("/auth:1000:2:2");

        for _ in 0..2 {
            let response = svc.clone().oneshot(get("/auth")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = svc.clone().oneshot(get("/auth")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["retry-after"], "1");

        tokio::time::advance(Duration::from_millis(1000)).await;
        let response = svc.oneshot(get("/auth")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_string_is_not_part_of_key() {
        let svc = limited_service("/auth:60000:1:1");

        let response = svc.clone().oneshot(get("/auth?a=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = svc.oneshot(get("/auth?a=2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_subpaths_share_the_rule_bucket() {
        let svc = limited_service("/api/v1/articles:60000:1:1");

        let response = svc.clone().oneshot(get("/api/v1/articles/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for id in 2..=50 {
            let uri = format!("/api/v1/articles/{id}");
            let response = svc.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_unmatched_path_is_always_admitted() {
        let svc = limited_service("/auth:60000:1:1");

        for _ in 0..50 {
            let response = svc.clone().oneshot(get("/api/v1/tags")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
