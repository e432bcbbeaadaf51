use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::error::ApiResult;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};

/// Counters for the caller's own activity. `matchedItems` counts approved
/// claims on either side: as claimant or as reporter of the found item.
pub async fn user_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let user_id = user.id;
    Ok(Json(blocking(&state, move |db| db.user_statistics(user_id)).await?))
}
