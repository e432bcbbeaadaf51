use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use unylost_types::api::RoleRequest;
use unylost_types::models::{Role, UserProfile};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};
use crate::sync;

const DEFAULT_SYNC_LIMIT: u32 = 20;

#[derive(Serialize)]
struct UserDetail {
    #[serde(flatten)]
    profile: UserProfile,
    found_items_count: i64,
    lost_items_count: i64,
    claims_count: i64,
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users: Vec<UserProfile> = blocking(&state, |db| db.list_users())
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();
    Ok(Json(json!({ "count": users.len(), "users": users })))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let detail = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_id(id)? else {
            return Ok(None);
        };
        let (found_items_count, lost_items_count, claims_count) = db.user_activity_counts(id)?;
        Ok(Some(UserDetail {
            profile: user.into(),
            found_items_count,
            lost_items_count,
            claims_count,
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "user": detail })))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let role = req
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| ApiError::bad_request("Invalid role. Role must be 'user' or 'admin'"))?;

    if !blocking(&state, move |db| db.update_user_role(id, role)).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!("User {} is now {}", id, role);
    Ok(Json(json!({
        "message": "User role updated successfully",
        "user": { "id": id, "role": role },
    })))
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(blocking(&state, |db| db.admin_dashboard()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    limit: Option<String>,
}

/// Runs the lost item sync on demand. A malformed or non-positive `limit`
/// falls back to the default batch.
pub async fn sync_lost_items(State(state): State<AppState>, Query(query): Query<SyncQuery>) -> impl IntoResponse {
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<u32>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_SYNC_LIMIT);
    Json(sync::sync_lost_items(&state, limit).await)
}
