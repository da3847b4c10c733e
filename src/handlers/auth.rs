use axum::Json;
use axum::extract::{Extension, State};
use tracing::instrument;

use super::util::JsonOrForm;
use crate::error::AppResult;
use crate::middleware::RequestDeadline;
use crate::models::{AuthRequest, TokenResponse};
use crate::state::AppState;

/// Exchange application credentials for an access token.
///
/// Accepts `app_key` / `app_secret` as JSON or as a urlencoded form.
#[instrument(skip_all)]
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(deadline): Extension<RequestDeadline>,
    JsonOrForm(payload): JsonOrForm<AuthRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = deadline
        .run(state.auth.issue(&payload.app_key, &payload.app_secret))
        .await??;

    Ok(Json(token))
}
