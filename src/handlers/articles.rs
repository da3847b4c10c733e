//! Article endpoints.
//!
//! Every article is filed under exactly one tag. Reads return the article
//! together with that tag; a single article is only visible while its tag is
//! open.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use super::util::{page_window, pager};
use crate::error::AppResult;
use crate::middleware::RequestDeadline;
use crate::models::{
    ArticleListQuery, ArticleQuery, ArticleView, CreateArticleRequest, ListResponse,
    UpdateArticleRequest, UpdateStateRequest,
};
use crate::state::AppState;
use crate::validation::{
    validate_create_article, validate_id, validate_state, validate_update_article,
    validate_update_state,
};

/// Get one article with its tag.
#[instrument(skip(state, deadline))]
pub async fn get_article(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
    Query(query): Query<ArticleQuery>,
) -> AppResult<Json<ArticleView>> {
    validate_id(id, "id")?;
    validate_state(query.state)?;

    let article = deadline
        .run(state.content.get_article(id, query.state))
        .await??;

    Ok(Json(article))
}

/// List articles by state, optionally under a single tag.
#[instrument(skip(state, deadline))]
pub async fn list_articles(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Query(query): Query<ArticleListQuery>,
) -> AppResult<Json<ListResponse<ArticleView>>> {
    if let Some(tag_id) = query.tag_id {
        validate_id(tag_id, "tag_id")?;
    }
    validate_state(query.state)?;
    let window = page_window(query.page, query.page_size, &state.config);

    let (list, total_rows) = deadline
        .run(state.content.list_articles(query.tag_id, query.state, window))
        .await?;

    Ok(Json(ListResponse {
        list,
        pager: pager(window, total_rows),
    }))
}

/// Create an article under an existing tag.
#[instrument(skip(state, deadline, payload))]
pub async fn create_article(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Json(payload): Json<CreateArticleRequest>,
) -> AppResult<(StatusCode, Json<ArticleView>)> {
    validate_create_article(&payload)?;

    let article = deadline.run(state.content.create_article(payload)).await??;

    Ok((StatusCode::CREATED, Json(article)))
}

#[instrument(skip(state, deadline, payload))]
pub async fn update_article(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
    Json(payload): Json<UpdateArticleRequest>,
) -> AppResult<Json<ArticleView>> {
    validate_id(id, "id")?;
    validate_update_article(&payload)?;

    let article = deadline
        .run(state.content.update_article(id, payload))
        .await??;

    Ok(Json(article))
}

#[instrument(skip(state, deadline, payload))]
pub async fn update_article_state(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
    Json(payload): Json<UpdateStateRequest>,
) -> AppResult<Json<ArticleView>> {
    validate_id(id, "id")?;
    validate_update_state(&payload)?;

    let update = UpdateArticleRequest {
        tag_id: None,
        title: None,
        desc: None,
        content: None,
        cover_image_url: None,
        state: Some(payload.state),
        modified_by: payload.modified_by,
    };
    let article = deadline
        .run(state.content.update_article(id, update))
        .await??;

    Ok(Json(article))
}

#[instrument(skip(state, deadline))]
pub async fn delete_article(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
) -> AppResult<StatusCode> {
    validate_id(id, "id")?;

    deadline.run(state.content.delete_article(id)).await??;

    Ok(StatusCode::NO_CONTENT)
}
