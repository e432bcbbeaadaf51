use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use unylost_db::models::{ListFilters, LostItemChanges, LostItemRow, NewLostItem};
use unylost_types::api::{FindMatchesRequest, ListQuery, LostItemForm, StatusRequest};
use unylost_types::models::{Category, LostItem, LostStatus};

use crate::ai_layer::ImageUpload;
use crate::error::{ApiError, ApiResult};
use crate::found_items::resolve_matches;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::storage::StoredFile;
use crate::sync::{discard_replaced_image, register_lost_item};
use crate::upload::Submission;
use crate::validation::{Checks, Page, list_filters, non_blank};

const STATUSES: &[&str] = &["active", "found", "closed"];

async fn list_page(state: &AppState, filters: ListFilters, page: Page) -> ApiResult<(Vec<LostItem>, i64)> {
    blocking(state, move |db| {
        let items = db
            .list_lost_items(&filters, page.limit, page.offset())?
            .into_iter()
            .map(LostItem::from)
            .collect();
        Ok((items, db.count_lost_items(&filters)?))
    })
    .await
}

async fn load(state: &AppState, id: i64) -> ApiResult<LostItemRow> {
    blocking(state, move |db| db.get_lost_item(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Lost item not found"))
}

async fn managed_item(state: &AppState, user: &CurrentUser, id: i64, denied: &str) -> ApiResult<LostItemRow> {
    let item = load(state, id).await?;
    if !user.can_manage(item.user_id) {
        return Err(ApiError::forbidden(denied));
    }
    Ok(item)
}

struct ValidForm {
    item_name: String,
    category_id: i64,
    description: Option<String>,
    /// The form carried a description, possibly blank.
    description_sent: bool,
    last_seen_location: String,
    lost_date: String,
    reward: Option<String>,
    image_url: Option<String>,
    status: Option<LostStatus>,
}

fn validate(form: LostItemForm) -> ApiResult<ValidForm> {
    let mut checks = Checks::new();
    checks.required("item_name", form.item_name.as_deref(), "Nama barang harus diisi");
    checks.required("category_id", form.category_id.as_deref(), "Kategori harus dipilih");
    checks.required(
        "last_seen_location",
        form.last_seen_location.as_deref(),
        "Lokasi terakhir dilihat harus diisi",
    );
    let lost_date = checks.date("lost_date", form.lost_date.as_deref(), "Tanggal hilang harus diisi");
    checks.url("image_url", form.image_url.as_deref(), "URL gambar tidak valid");
    checks.finish()?;

    let category_id = non_blank(&form.category_id)
        .and_then(|c| c.parse::<i64>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid category"))?;

    Ok(ValidForm {
        item_name: form.item_name.unwrap_or_default().trim().to_string(),
        category_id,
        description_sent: form.description.is_some(),
        description: form.description.filter(|d| !d.trim().is_empty()),
        last_seen_location: form.last_seen_location.unwrap_or_default().trim().to_string(),
        lost_date: lost_date.unwrap_or_default(),
        reward: form.reward,
        image_url: form.image_url.filter(|u| !u.is_empty()),
        status: form.status.as_deref().and_then(LostStatus::parse),
    })
}

async fn require_category(state: &AppState, id: i64) -> ApiResult<Category> {
    blocking(state, move |db| db.get_category(id))
        .await?
        .map(Category::from)
        .ok_or_else(|| ApiError::bad_request("Invalid category"))
}

// -- Listings --

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    let page = Page::from_query(&query);
    let (filters, applied) = list_filters(&query, STATUSES);
    let (items, total) = list_page(&state, filters, page).await?;
    Ok(Json(json!({
        "items": items,
        "filters": applied,
        "pagination": page.pagination(total),
    })))
}

pub async fn search(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    let q = non_blank(&query.q)
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?
        .to_string();
    let page = Page::from_query(&query);

    let keywords = q.clone();
    let items: Vec<LostItem> = blocking(&state, move |db| {
        db.search_lost_items(&keywords, page.limit, page.offset())
    })
    .await?
    .into_iter()
    .map(LostItem::from)
    .collect();

    Ok(Json(json!({ "count": items.len(), "query": q, "items": items })))
}

pub async fn my_items(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_items(&state, user.id, &query).await
}

pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_items(&state, user_id, &query).await
}

async fn user_items(state: &AppState, user_id: i64, query: &ListQuery) -> ApiResult<Json<Value>> {
    let page = Page::from_query(query);
    let filters = ListFilters { user_id: Some(user_id), ..Default::default() };
    let (items, total) = list_page(state, filters, page).await?;
    Ok(Json(json!({ "items": items, "pagination": page.pagination(total) })))
}

pub async fn by_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let category = require_category(&state, category_id).await?;
    let page = Page::from_query(&query);
    let filters = ListFilters { category_id: Some(category_id), ..Default::default() };
    let (items, total) = list_page(&state, filters, page).await?;
    Ok(Json(json!({
        "category": category,
        "items": items,
        "pagination": page.pagination(total),
    })))
}

// -- Matching --

/// Asks the AI Layer for found items resembling a stored lost item.
pub async fn matches(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let item = managed_item(&state, &user, id, "Not authorized to view matches for this item").await?;

    let matches = state
        .ai
        .match_item(item.description.as_deref(), item.image_url.as_deref())
        .await
        .map_err(|e| {
            error!("AI Layer match failed for lost item {}: {:#}", id, e);
            ApiError::Upstream("Error finding matching items".into())
        })?;

    Ok(Json(json!({
        "lostItem": LostItem::from(item),
        "total_matches": matches.len(),
        "matches": matches,
    })))
}

/// Matches an ad-hoc description and/or photo against the found items. The
/// uploaded photo is only kept for the duration of the request.
pub async fn find_matches(
    State(state): State<AppState>,
    submission: Submission<FindMatchesRequest, 1>,
) -> ApiResult<impl IntoResponse> {
    let Submission { fields, files } = submission;
    let result = find_matching(&state, fields, &files).await;
    state.storage.remove_all(&files).await;
    result.map(Json)
}

async fn find_matching(state: &AppState, req: FindMatchesRequest, files: &[StoredFile]) -> ApiResult<Value> {
    let description = non_blank(&req.description);

    let matches = match (files.first(), description) {
        (Some(file), _) => match ImageUpload::read(file).await {
            Ok(upload) => state.ai.match_image(description, &upload).await,
            Err(e) => Err(e),
        },
        (None, Some(text)) => state.ai.text_search(text, Some("found_items")).await,
        (None, None) => {
            return Err(ApiError::bad_request("Either description or image file is required"));
        }
    }
    .map_err(|e| {
        error!("AI Layer matching failed: {:#}", e);
        ApiError::Upstream("Error finding matching items".into())
    })?;

    let matches = blocking(state, move |db| resolve_matches(db, matches)).await?;
    Ok(json!({
        "message": "Found items that match your lost item",
        "direction": "lost → found",
        "total_matches": matches.len(),
        "matches": matches,
    }))
}

// -- CRUD --

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    submission: Submission<LostItemForm, 1>,
) -> ApiResult<impl IntoResponse> {
    let Submission { fields, files } = submission;
    match create_item(&state, &user, fields, &files).await {
        Ok(body) => Ok((StatusCode::CREATED, Json(body))),
        Err(e) => {
            state.storage.remove_all(&files).await;
            Err(e)
        }
    }
}

async fn create_item(
    state: &AppState,
    user: &CurrentUser,
    form: LostItemForm,
    files: &[StoredFile],
) -> ApiResult<Value> {
    let form = validate(form)?;
    require_category(state, form.category_id).await?;

    let user_id = user.id;
    let image_url = files.first().map(|f| f.url.clone()).or(form.image_url);
    let (item_name, description, location, lost_date, reward, stored_image) = (
        form.item_name,
        form.description,
        form.last_seen_location,
        form.lost_date,
        form.reward,
        image_url.clone(),
    );
    let category_id = form.category_id;
    let item = blocking(state, move |db| {
        let id = db.create_lost_item(&NewLostItem {
            user_id,
            category_id,
            item_name: &item_name,
            description: description.as_deref(),
            last_seen_location: &location,
            lost_date: &lost_date,
            reward: reward.as_deref(),
            image_url: stored_image.as_deref(),
        })?;
        db.get_lost_item(id)
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("lost item vanished after insert")))?;
    let id = item.id;
    info!("User {} reported lost item {} ({})", user.id, id, item.item_name);

    match register_lost_item(state, &item).await {
        Ok(reg) => {
            let firestore_id = reg.item_id.clone();
            let remote_image = reg.image_url.clone();
            let item = blocking(state, move |db| {
                db.set_lost_item_remote(id, &firestore_id, remote_image.as_deref())?;
                db.get_lost_item(id)
            })
            .await?
            .map(LostItem::from)
            .ok_or_else(|| ApiError::not_found("Lost item not found"))?;

            discard_replaced_image(state, image_url.as_deref(), reg.image_url.as_deref()).await;

            let mut body = json!({
                "message": "Lost item created successfully",
                "item": item,
                "potential_matches": reg.matches,
            });
            if let Some(url) = reg.image_url.or(image_url) {
                body["image_url"] = json!(url);
            }
            Ok(body)
        }
        Err(e) => {
            warn!("AI Layer registration failed for lost item {}: {:#}", id, e);
            let message = format!("{:#}", e);
            let item = blocking(state, move |db| {
                db.mark_sync_failed(id, &message)?;
                db.get_lost_item(id)
            })
            .await?
            .map(LostItem::from)
            .ok_or_else(|| ApiError::not_found("Lost item not found"))?;

            let mut body = json!({
                "message": "Lost item created successfully, but AI processing failed",
                "item": item,
                "warning": "Item not synced with AI system, matching functionality limited",
            });
            if let Some(url) = image_url {
                body["image_url"] = json!(url);
            }
            Ok(body)
        }
    }
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let item = LostItem::from(load(&state, id).await?);
    Ok(Json(json!({ "item": item })))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(form): Json<LostItemForm>,
) -> ApiResult<impl IntoResponse> {
    let form = validate(form)?;
    let existing = managed_item(&state, &user, id, "Not authorized to update this item").await?;
    let category = require_category(&state, form.category_id).await?;

    let changes = LostItemChanges {
        item_name: Some(form.item_name.clone()),
        category_id: Some(form.category_id),
        description: form.description_sent.then(|| form.description.clone()),
        last_seen_location: Some(form.last_seen_location.clone()),
        lost_date: Some(form.lost_date.clone()),
        image_url: form.image_url.clone(),
        reward: form.reward.clone(),
        status: form.status,
    };
    if !blocking(&state, move |db| db.update_lost_item(id, changes)).await? {
        return Err(ApiError::not_found("Lost item not found"));
    }

    if let Some(fid) = &existing.firestore_id {
        let mut fields = json!({
            "item_name": form.item_name,
            "description": form.description,
            "category": category.name,
            "last_seen_location": form.last_seen_location,
            "date_lost": form.lost_date,
        });
        if let Some(reward) = &form.reward {
            fields["reward"] = json!(reward);
        }
        if let Some(status) = form.status {
            fields["status"] = json!(status);
        }
        if let Some(url) = &form.image_url {
            fields["image_url"] = json!(url);
        }
        if let Err(e) = state.ai.update_item(fid, &fields).await {
            warn!("AI Layer update failed for lost item {}: {:#}", id, e);
        }
    }

    let item = LostItem::from(load(&state, id).await?);
    Ok(Json(json!({ "message": "Lost item updated successfully", "item": item })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let existing = managed_item(&state, &user, id, "Not authorized to delete this item").await?;

    if !blocking(&state, move |db| db.delete_lost_item(id)).await? {
        return Err(ApiError::not_found("Lost item not found"));
    }

    if let Some(fid) = &existing.firestore_id {
        if let Err(e) = state.ai.delete_item(fid).await {
            warn!("AI Layer delete failed for lost item {}: {:#}", id, e);
        }
    }
    if let Some(url) = &existing.image_url {
        state.storage.remove_url(url).await;
    }

    info!("Deleted lost item {}", id);
    Ok(Json(json!({ "message": "Lost item deleted successfully" })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = req
        .status
        .as_deref()
        .and_then(LostStatus::parse)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let existing = managed_item(&state, &user, id, "Not authorized to update status").await?;
    if !blocking(&state, move |db| db.update_lost_item_status(id, status)).await? {
        return Err(ApiError::not_found("Lost item not found"));
    }

    if let Some(fid) = &existing.firestore_id {
        if let Err(e) = state.ai.update_item_status(fid, status.as_str()).await {
            warn!("AI Layer status update failed for lost item {}: {:#}", id, e);
        }
    }

    Ok(Json(json!({
        "message": "Lost item status updated successfully",
        "item": { "id": id, "status": status },
    })))
}
