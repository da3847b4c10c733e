use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::STATE_OPEN;

fn default_state() -> u8 {
    STATE_OPEN
}

// =============================================================================
// Authentication
// =============================================================================

/// Credentials exchanged for an access token at `POST /auth`.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub app_key: String,
    pub app_secret: String,
}

/// Issued access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Tags
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub created_by: String,
    #[serde(default = "default_state")]
    pub state: u8,
}

/// Partial tag update; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub state: Option<u8>,
    pub modified_by: String,
}

/// Query string of `GET /api/v1/tags`.
#[derive(Debug, Deserialize)]
pub struct TagListQuery {
    /// Exact name filter
    pub name: Option<String>,
    #[serde(default = "default_state")]
    pub state: u8,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// =============================================================================
// Articles
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub tag_id: u32,
    pub title: String,
    pub desc: String,
    pub content: String,
    pub cover_image_url: String,
    pub created_by: String,
    #[serde(default = "default_state")]
    pub state: u8,
}

/// Partial article update; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub tag_id: Option<u32>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub state: Option<u8>,
    pub modified_by: String,
}

/// Query string of `GET /api/v1/articles`.
#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub tag_id: Option<u32>,
    #[serde(default = "default_state")]
    pub state: u8,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Query string of `GET /api/v1/articles/{id}`.
#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    #[serde(default = "default_state")]
    pub state: u8,
}

/// Body of the `PATCH .../state` endpoints.
#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub state: u8,
    pub modified_by: String,
}

// =============================================================================
// Listing
// =============================================================================

/// Page position and total row count of a list response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pager {
    pub page: u32,
    pub page_size: u32,
    pub total_rows: usize,
}

/// One page of results.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub list: Vec<T>,
    pub pager: Pager,
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub run_mode: String,
    pub uptime_seconds: u64,
    /// Token buckets currently held by the rate limiter
    pub token_buckets: usize,
    pub timestamp: DateTime<Utc>,
}
