use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use super::util::{page_window, pager};
use crate::error::AppResult;
use crate::middleware::RequestDeadline;
use crate::models::{
    CreateTagRequest, ListResponse, Tag, TagListQuery, UpdateStateRequest, UpdateTagRequest,
};
use crate::state::AppState;
use crate::validation::{
    validate_create_tag, validate_id, validate_state, validate_update_state, validate_update_tag,
};

/// List tags by state, optionally filtered by exact name.
#[instrument(skip(state, deadline))]
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Query(query): Query<TagListQuery>,
) -> AppResult<Json<ListResponse<Tag>>> {
    validate_state(query.state)?;
    let window = page_window(query.page, query.page_size, &state.config);

    let (list, total_rows) = deadline
        .run(
            state
                .content
                .list_tags(query.name.as_deref(), query.state, window),
        )
        .await?;

    Ok(Json(ListResponse {
        list,
        pager: pager(window, total_rows),
    }))
}

/// Create a tag.
#[instrument(skip(state, deadline, payload))]
pub async fn create_tag(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Json(payload): Json<CreateTagRequest>,
) -> AppResult<(StatusCode, Json<Tag>)> {
    validate_create_tag(&payload)?;

    let tag = deadline.run(state.content.create_tag(payload)).await??;

    Ok((StatusCode::CREATED, Json(tag)))
}

/// Replace the name and/or state of a tag.
#[instrument(skip(state, deadline, payload))]
pub async fn update_tag(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
    Json(payload): Json<UpdateTagRequest>,
) -> AppResult<Json<Tag>> {
    validate_id(id, "id")?;
    validate_update_tag(&payload)?;

    let tag = deadline.run(state.content.update_tag(id, payload)).await??;

    Ok(Json(tag))
}

/// Open or close a tag.
#[instrument(skip(state, deadline, payload))]
pub async fn update_tag_state(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
    Json(payload): Json<UpdateStateRequest>,
) -> AppResult<Json<Tag>> {
    validate_id(id, "id")?;
    validate_update_state(&payload)?;

    let update = UpdateTagRequest {
        name: None,
        state: Some(payload.state),
        modified_by: payload.modified_by,
    };
    let tag = deadline.run(state.content.update_tag(id, update)).await??;

    Ok(Json(tag))
}

/// Soft-delete a tag.
#[instrument(skip(state, deadline))]
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    Path(id): Path<u32>,
) -> AppResult<StatusCode> {
    validate_id(id, "id")?;

    deadline.run(state.content.delete_tag(id)).await??;

    Ok(StatusCode::NO_CONTENT)
}
