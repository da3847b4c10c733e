use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Disabled tag or unpublished article.
pub const STATE_CLOSED: u8 = 0;

/// Enabled tag or published article.
pub const STATE_OPEN: u8 = 1;

/// A tag articles are filed under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: u32,
    pub name: String,
    pub state: u8,
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; deleted tags are invisible to every query.
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Stored article. Each article is filed under exactly one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: u32,
    pub tag_id: u32,
    pub title: String,
    pub desc: String,
    pub content: String,
    pub cover_image_url: String,
    pub state: u8,
    pub created_by: String,
    pub modified_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Article as returned to clients, with its tag resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleView {
    pub id: u32,
    pub title: String,
    pub desc: String,
    pub content: String,
    pub cover_image_url: String,
    pub state: u8,
    pub tag: Option<Tag>,
}

impl ArticleView {
    pub fn new(article: &Article, tag: Option<Tag>) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            desc: article.desc.clone(),
            content: article.content.clone(),
            cover_image_url: article.cover_image_url.clone(),
            state: article.state,
            tag,
        }
    }
}
