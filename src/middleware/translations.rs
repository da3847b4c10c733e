//! Localized validation messages.
//!
//! Reads the `locale` request header and, when a handler rejects the request
//! with [`AppError::BadRequest`], re-renders the message of the `400` body in
//! that language. Status, headers and every other response pass through
//! untouched.
//!
//! ```bash
//! curl -H "locale: zh" -X POST http://localhost:8000/api/v1/tags -d 'name='
//! ```

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;

use crate::error::AppError;
use crate::i18n::{LOCALE_HEADER, Locale, Violation};

/// Translations layer.
#[derive(Clone, Copy, Default)]
pub struct TranslationsLayer;

impl TranslationsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TranslationsLayer {
    type Service = TranslationsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TranslationsService { inner }
    }
}

/// Translations service wrapper.
#[derive(Clone)]
pub struct TranslationsService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TranslationsService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let locale = Locale::from_header(req.headers().get(LOCALE_HEADER));
        req.extensions_mut().insert(locale);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            if locale == Locale::En {
                return Ok(response);
            }
            Ok(localize(response, locale))
        })
    }
}

fn localize(response: Response<Body>, locale: Locale) -> Response<Body> {
    let Some(violation) = response.extensions().get::<Violation>().cloned() else {
        return response;
    };

    let body = match serde_json::to_vec(&AppError::BadRequest(violation).body(locale)) {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Keeping untranslated error body");
            return response;
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}
