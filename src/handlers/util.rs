//! Shared utilities for handlers.

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;
use crate::models::Pager;
use crate::services::PageWindow;

/// Resolve the page window of a list request.
///
/// `page` below 1 (or absent) becomes 1. `page_size` defaults to the
/// configured default and is clamped to `1..=max_page_size`.
pub fn page_window(page: Option<u32>, page_size: Option<u32>, config: &Config) -> PageWindow {
    let page = page.unwrap_or(1).max(1);
    let page_size = match page_size {
        Some(0) | None => config.default_page_size,
        Some(size) => size,
    }
    .min(config.max_page_size)
    .max(1);

    PageWindow { page, page_size }
}

/// Build the pager block of a list response.
pub fn pager(window: PageWindow, total_rows: usize) -> Pager {
    Pager {
        page: window.page,
        page_size: window.page_size,
        total_rows,
    }
}

/// Body extractor accepting either a JSON or a urlencoded form payload.
///
/// The content type decides the decoder; anything that is not JSON is read
/// as a form. Decoding failures surface as `400` with the standard body.
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                debug!(error = %e, "Rejected JSON body");
                AppError::BadRequest(e.body_text().into())
            })?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                debug!(error = %e, "Rejected form body");
                AppError::BadRequest(e.body_text().into())
            })?;
            Ok(Self(value))
        }
    }
}
