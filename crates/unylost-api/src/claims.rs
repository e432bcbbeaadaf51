use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::info;

use unylost_db::models::{ListFilters, NewClaim};
use unylost_types::api::{ClaimRequest, ListQuery, StatusRequest};
use unylost_types::models::{ClaimStatus, ItemClaim};

use crate::error::{ApiError, ApiResult, FieldError};
use crate::found_items::load_item;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::validation::{Checks, Page, list_filters, non_blank, normalize_date};

const STATUSES: &[&str] = &["pending", "approved", "rejected"];

async fn claims_page(state: &AppState, filters: ListFilters, page: Page) -> ApiResult<(Vec<ItemClaim>, i64)> {
    blocking(state, move |db| {
        let claims = db
            .list_claims(&filters, page.limit, page.offset())?
            .into_iter()
            .map(ItemClaim::from)
            .collect();
        Ok((claims, db.count_claims(&filters)?))
    })
    .await
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    let page = Page::from_query(&query);
    let (filters, applied) = list_filters(&query, STATUSES);
    let (claims, total) = claims_page(&state, filters, page).await?;
    Ok(Json(json!({
        "claims": claims,
        "filters": applied,
        "pagination": page.claim_pagination(total),
    })))
}

pub async fn my_claims(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_claims(&state, user.id, &query).await
}

pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_claims(&state, user_id, &query).await
}

async fn user_claims(state: &AppState, user_id: i64, query: &ListQuery) -> ApiResult<Json<Value>> {
    let page = Page::from_query(query);
    let filters = ListFilters { user_id: Some(user_id), ..Default::default() };
    let (claims, total) = claims_page(state, filters, page).await?;
    Ok(Json(json!({ "claims": claims, "pagination": page.claim_pagination(total) })))
}

/// Claims on one found item, visible to its reporter and to admins.
pub async fn by_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(item_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let item = blocking(&state, move |db| load_item(db, item_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    if !user.can_manage(item.user_id) {
        return Err(ApiError::forbidden("Not authorized to view claims for this item"));
    }

    let page = Page::from_query(&query);
    let filters = ListFilters { item_id: Some(item_id), ..Default::default() };
    let (claims, total) = claims_page(&state, filters, page).await?;
    Ok(Json(json!({
        "item": item,
        "claims": claims,
        "pagination": page.claim_pagination(total),
    })))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut checks = Checks::new();
    checks.required("item_id", req.item_id.as_deref(), "ID barang harus diisi");
    checks.required("description", req.description.as_deref(), "Deskripsi klaim harus diisi");
    checks.finish()?;

    let item_id = non_blank(&req.item_id)
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    let lost_date = match non_blank(&req.lost_date) {
        Some(raw) => Some(normalize_date(raw).ok_or_else(|| {
            ApiError::Validation(vec![FieldError::new("lost_date", Some(raw), "Tanggal hilang tidak valid")])
        })?),
        None => None,
    };

    let item = blocking(&state, move |db| db.get_found_item(item_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    if !item.status().is_claimable() {
        return Err(ApiError::bad_request("Item is not available for claiming"));
    }

    let user_id = user.id;
    let description = req.description.unwrap_or_default().trim().to_string();
    let (lost_location, additional_proof) = (req.lost_location, req.additional_proof);
    let claim = blocking(&state, move |db| {
        let created = db.create_claim(&NewClaim {
            user_id,
            item_id,
            description: &description,
            lost_location: lost_location.as_deref(),
            lost_date: lost_date.as_deref(),
            additional_proof: additional_proof.as_deref(),
        })?;
        match created {
            Some(id) => db.get_claim(id),
            None => Ok(None),
        }
    })
    .await?
    .map(ItemClaim::from)
    .ok_or_else(|| ApiError::bad_request("You have already claimed this item"))?;

    info!("User {} claimed found item {} (claim {})", user.id, item_id, claim.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Claim created successfully", "claim": claim })),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let claim = blocking(&state, move |db| db.get_claim(id))
        .await?
        .map(ItemClaim::from)
        .ok_or_else(|| ApiError::not_found("Claim not found"))?;
    if !user.can_manage(claim.user_id) {
        return Err(ApiError::forbidden("Not authorized to view this claim"));
    }
    Ok(Json(json!({ "claim": claim })))
}

/// Approving a claim settles the item: it becomes `claimed` and every other
/// pending claim on it is rejected.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = req
        .status
        .as_deref()
        .and_then(ClaimStatus::parse)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;
    let admin_notes = req.admin_notes;

    let notes = admin_notes.clone();
    let updated = blocking(&state, move |db| match status {
        ClaimStatus::Approved => {
            let outcome = db.approve_claim(id, notes.as_deref())?;
            if let Some(outcome) = &outcome {
                info!(
                    "Claim {} approved; item {} claimed, {} competing claims rejected",
                    id,
                    outcome.item_id,
                    outcome.rejected_claim_ids.len()
                );
            }
            Ok(outcome.is_some())
        }
        other => db.update_claim_status(id, other, notes.as_deref()),
    })
    .await?;

    if !updated {
        return Err(ApiError::not_found("Claim not found"));
    }

    Ok(Json(json!({
        "message": format!("Claim status updated to {}", status),
        "claim": { "id": id, "status": status, "admin_notes": admin_notes },
    })))
}
