mod api;
mod content;

pub use api::{
    ArticleListQuery, ArticleQuery, AuthRequest, CreateArticleRequest, CreateTagRequest,
    HealthResponse, ListResponse, Pager, TagListQuery, TokenResponse, UpdateArticleRequest,
    UpdateStateRequest, UpdateTagRequest,
};
pub use content::{Article, ArticleView, STATE_CLOSED, STATE_OPEN, Tag};
