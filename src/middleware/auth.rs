//! Token authentication for the `/api/v1` group.
//!
//! Clients obtain a token from `POST /auth` and present it via:
//!
//! ```bash
//! # Header method (preferred)
//! curl -H "token: 3f1c..." http://localhost:8000/api/v1/tags
//!
//! # Query parameter method
//! curl "http://localhost:8000/api/v1/tags?token=3f1c..."
//! ```
//!
//! While no `APP_SECRET` is configured the layer lets every request through.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::services::AuthService;

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "token";

/// Query parameter carrying the access token.
pub const TOKEN_QUERY: &str = "token";

/// Token authentication layer.
#[derive(Clone)]
pub struct TokenAuth {
    auth: Arc<AuthService>,
}

impl TokenAuth {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    pub fn is_enabled(&self) -> bool {
        self.auth.is_enabled()
    }
}

impl<S> Layer<S> for TokenAuth {
    type Service = TokenAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenAuthService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// Token authentication service wrapper.
#[derive(Clone)]
pub struct TokenAuthService<S> {
    inner: S,
    auth: Arc<AuthService>,
}

impl<S> Service<Request<Body>> for TokenAuthService<S>
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
        let auth = self.auth.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !auth.is_enabled() {
                return inner.call(req).await;
            }

            let token = extract_token(&req);
            match auth.verify(token.as_deref()).await {
                Ok(()) => {
                    debug!("Token authentication successful");
                    inner.call(req).await
                }
                Err(e) => {
                    warn!(path = %req.uri().path(), error = %e, "Token authentication failed");
                    Ok(e.into_response())
                }
            }
        })
    }
}

/// Extract the token from the `token` header, falling back to the query string.
fn extract_token<B>(req: &Request<B>) -> Option<String> {
    if let Some(header_value) = req.headers().get(TOKEN_HEADER)
        && let Ok(value) = header_value.to_str()
    {
        return Some(value.to_string());
    }

    req.uri().query()?.split('&').find_map(|pair| {
        pair.split_once('=')
            .filter(|(key, _)| *key == TOKEN_QUERY)
            .map(|(_, value)| value.to_string())
    })
}
