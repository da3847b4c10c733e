use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::models::{
    Article, ArticleView, CreateArticleRequest, CreateTagRequest, STATE_OPEN, Tag,
    UpdateArticleRequest, UpdateTagRequest,
};

/// Page window resolved by the handler: 1-based page and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
}

impl PageWindow {
    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }

    fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset())
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Store {
    tags: BTreeMap<u32, Tag>,
    articles: BTreeMap<u32, Article>,
    next_tag_id: u32,
    next_article_id: u32,
}

impl Store {
    fn live_tag(&self, id: u32) -> AppResult<&Tag> {
        self.tags
            .get(&id)
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("tag {id}")))
    }

    fn live_tag_mut(&mut self, id: u32) -> AppResult<&mut Tag> {
        self.tags
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("tag {id}")))
    }

    fn live_article_mut(&mut self, id: u32) -> AppResult<&mut Article> {
        self.articles
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("article {id}")))
    }

    fn view(&self, article: &Article) -> ArticleView {
        let tag = self
            .tags
            .get(&article.tag_id)
            .filter(|t| !t.is_deleted())
            .cloned();
        ArticleView::new(article, tag)
    }
}

/// In-memory tag and article store with soft-delete semantics.
///
/// Ids are assigned sequentially from 1 and never reused. Deleted rows stay
/// in the store but are invisible to every operation.
#[derive(Default)]
pub struct ContentService {
    store: RwLock<Store>,
}

impl ContentService {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Tags
    // =========================================================================

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_tag(&self, req: CreateTagRequest) -> AppResult<Tag> {
        let mut store = self.store.write().await;
        store.next_tag_id += 1;

        let tag = Tag {
            id: store.next_tag_id,
            name: req.name,
            state: req.state,
            created_by: req.created_by,
            modified_by: String::new(),
            created_at: Utc::now(),
            modified_at: None,
            deleted_at: None,
        };
        store.tags.insert(tag.id, tag.clone());

        info!(tag_id = tag.id, "Tag created");
        Ok(tag)
    }

    #[instrument(skip(self, req))]
    pub async fn update_tag(&self, id: u32, req: UpdateTagRequest) -> AppResult<Tag> {
        let mut store = self.store.write().await;
        let tag = store.live_tag_mut(id)?;

        if let Some(name) = req.name {
            tag.name = name;
        }
        if let Some(state) = req.state {
            tag.state = state;
        }
        tag.modified_by = req.modified_by;
        tag.modified_at = Some(Utc::now());

        Ok(tag.clone())
    }

    #[instrument(skip(self))]
    pub async fn delete_tag(&self, id: u32) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.live_tag_mut(id)?.deleted_at = Some(Utc::now());
        info!(tag_id = id, "Tag deleted");
        Ok(())
    }

    /// Tags with the given state, optionally with an exact name, by id.
    pub async fn list_tags(
        &self,
        name: Option<&str>,
        state: u8,
        window: PageWindow,
    ) -> (Vec<Tag>, usize) {
        let store = self.store.read().await;
        let matching: Vec<Tag> = store
            .tags
            .values()
            .filter(|t| !t.is_deleted() && t.state == state)
            .filter(|t| name.is_none_or(|n| n.is_empty() || t.name == n))
            .cloned()
            .collect();

        (window.slice(&matching), matching.len())
    }

    // =========================================================================
    // Articles
    // =========================================================================

    /// Create an article filed under an existing tag.
    #[instrument(skip(self, req), fields(tag_id = req.tag_id))]
    pub async fn create_article(&self, req: CreateArticleRequest) -> AppResult<ArticleView> {
        let mut store = self.store.write().await;
        store.live_tag(req.tag_id)?;
        store.next_article_id += 1;

        let article = Article {
            id: store.next_article_id,
            tag_id: req.tag_id,
            title: req.title,
            desc: req.desc,
            content: req.content,
            cover_image_url: req.cover_image_url,
            state: req.state,
            created_by: req.created_by,
            modified_by: String::new(),
            created_at: Utc::now(),
            modified_at: None,
            deleted_at: None,
        };
        let view = store.view(&article);
        store.articles.insert(article.id, article);

        info!(article_id = view.id, "Article created");
        Ok(view)
    }

    #[instrument(skip(self, req))]
    pub async fn update_article(&self, id: u32, req: UpdateArticleRequest) -> AppResult<ArticleView> {
        let mut store = self.store.write().await;
        if let Some(tag_id) = req.tag_id {
            store.live_tag(tag_id)?;
        }

        let article = store.live_article_mut(id)?;
        if let Some(tag_id) = req.tag_id {
            article.tag_id = tag_id;
        }
        if let Some(title) = req.title {
            article.title = title;
        }
        if let Some(desc) = req.desc {
            article.desc = desc;
        }
        if let Some(content) = req.content {
            article.content = content;
        }
        if let Some(url) = req.cover_image_url {
            article.cover_image_url = url;
        }
        if let Some(state) = req.state {
            article.state = state;
        }
        article.modified_by = req.modified_by;
        article.modified_at = Some(Utc::now());

        let article = article.clone();
        Ok(store.view(&article))
    }

    #[instrument(skip(self))]
    pub async fn delete_article(&self, id: u32) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.live_article_mut(id)?.deleted_at = Some(Utc::now());
        info!(article_id = id, "Article deleted");
        Ok(())
    }

    /// Article `id` in `state`, with its tag. The tag must be open.
    pub async fn get_article(&self, id: u32, state: u8) -> AppResult<ArticleView> {
        let store = self.store.read().await;
        let article = store
            .articles
            .get(&id)
            .filter(|a| !a.is_deleted() && a.state == state)
            .ok_or_else(|| AppError::NotFound(format!("article {id}")))?;

        let tag = store
            .live_tag(article.tag_id)
            .ok()
            .filter(|t| t.state == STATE_OPEN)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("tag of article {id}")))?;

        Ok(ArticleView::new(article, Some(tag)))
    }

    /// Articles with the given state, optionally under one tag, by id.
    pub async fn list_articles(
        &self,
        tag_id: Option<u32>,
        state: u8,
        window: PageWindow,
    ) -> (Vec<ArticleView>, usize) {
        let store = self.store.read().await;
        let matching: Vec<&Article> = store
            .articles
            .values()
            .filter(|a| !a.is_deleted() && a.state == state)
            .filter(|a| tag_id.is_none_or(|id| a.tag_id == id))
            .collect();

        let page = window
            .slice(&matching)
            .into_iter()
            .map(|a| store.view(a))
            .collect();

        (page, matching.len())
    }
}
