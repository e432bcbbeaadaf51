use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use unylost_db::{
    Database,
    models::{FoundItemChanges, FoundItemRow, ListFilters, NewFoundItem},
};
use unylost_types::api::{FindMatchesRequest, FoundItemForm, ListQuery, StatusRequest};
use unylost_types::models::{Category, FoundItem, FoundItemImage, FoundStatus};

use crate::ai_layer::{FoundItemDocument, ImageUpload, Match};
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};
use crate::storage::StoredFile;
use crate::upload::{NoFields, Submission};
use crate::validation::{Checks, Page, list_filters, non_blank};

const MAX_IMAGES: usize = 5;

const STATUSES: &[&str] = &["pending", "approved", "claimed", "returned", "rejected"];

// -- Loading helpers, shared with the lost-item handlers --

/// Attaches every row's images with a single query.
pub(crate) fn with_images(db: &Database, rows: Vec<FoundItemRow>) -> anyhow::Result<Vec<FoundItem>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut images = db.get_images_for_items(&ids)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let item_images = images
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(FoundItemImage::from)
                .collect();
            row.into_item(item_images)
        })
        .collect())
}

pub(crate) fn load_item(db: &Database, id: i64) -> anyhow::Result<Option<FoundItem>> {
    let Some(row) = db.get_found_item(id)? else {
        return Ok(None);
    };
    let images = db
        .get_images_for_item(id)?
        .into_iter()
        .map(FoundItemImage::from)
        .collect();
    Ok(Some(row.into_item(images)))
}

/// Resolves AI Layer hits to local found items. Hits without an id, or whose
/// document is not known locally, are dropped.
pub(crate) fn resolve_matches(db: &Database, matches: Vec<Match>) -> anyhow::Result<Vec<Value>> {
    let mut resolved = Vec::new();
    for hit in matches {
        let Some(firestore_id) = hit.id.as_deref() else {
            continue;
        };
        let Some(row) = db.get_found_item_by_firestore_id(firestore_id)? else {
            continue;
        };
        let Some(item) = with_images(db, vec![row])?.pop() else {
            continue;
        };
        let mut value = serde_json::to_value(item)?;
        value["match_score"] = json!(hit.score);
        value["match_type"] = json!(hit.match_type);
        resolved.push(value);
    }
    Ok(resolved)
}

async fn list_page(
    state: &AppState,
    filters: ListFilters,
    page: Page,
) -> ApiResult<(Vec<FoundItem>, i64)> {
    blocking(state, move |db| {
        let rows = db.list_found_items(&filters, page.limit, page.offset())?;
        let total = db.count_found_items(&filters)?;
        Ok((with_images(db, rows)?, total))
    })
    .await
}

/// Loads an item the caller may modify.
async fn managed_item(state: &AppState, user: &CurrentUser, id: i64, denied: &str) -> ApiResult<FoundItemRow> {
    let item = blocking(state, move |db| db.get_found_item(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Found item not found"))?;
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
    location: String,
    found_date: String,
}

fn validate(form: FoundItemForm) -> ApiResult<ValidForm> {
    let mut checks = Checks::new();
    checks.required("item_name", form.item_name.as_deref(), "Nama barang harus diisi");
    checks.required("category_id", form.category_id.as_deref(), "Kategori harus dipilih");
    checks.required("location", form.location.as_deref(), "Lokasi ditemukan harus diisi");
    let found_date = checks.date("found_date", form.found_date.as_deref(), "Tanggal ditemukan harus diisi");
    checks.finish()?;

    let category_id = non_blank(&form.category_id)
        .and_then(|c| c.parse::<i64>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid category"))?;

    Ok(ValidForm {
        item_name: form.item_name.unwrap_or_default().trim().to_string(),
        category_id,
        description_sent: form.description.is_some(),
        description: form.description.filter(|d| !d.trim().is_empty()),
        location: form.location.unwrap_or_default().trim().to_string(),
        found_date: found_date.unwrap_or_default(),
    })
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
    let items = blocking(&state, move |db| {
        let rows = db.search_found_items(&keywords, page.limit, page.offset())?;
        with_images(db, rows)
    })
    .await?;

    Ok(Json(json!({ "count": items.len(), "query": q, "items": items })))
}

pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_items(&state, user_id, &query).await
}

pub async fn my_items(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    user_items(&state, user.id, &query).await
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
    let category = blocking(&state, move |db| db.get_category(category_id))
        .await?
        .map(Category::from)
        .ok_or_else(|| ApiError::bad_request("Invalid category"))?;

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

/// Looks for reported found items resembling a description and/or image.
pub async fn find_matches(
    State(state): State<AppState>,
    Json(req): Json<FindMatchesRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = non_blank(&req.description).map(str::to_string);
    let image_url = non_blank(&req.image_url).map(str::to_string);

    let matches = match (&description, &image_url) {
        (_, Some(url)) => {
            state
                .ai
                .hybrid_search(description.as_deref().unwrap_or_default(), url)
                .await
        }
        (Some(text), None) => state.ai.text_search(text, None).await,
        (None, None) => {
            return Err(ApiError::bad_request("Either description or image_url is required"));
        }
    }
    .map_err(|e| {
        error!("AI Layer search failed: {:#}", e);
        ApiError::Upstream("Error finding matching items".into())
    })?;

    let matches = blocking(&state, move |db| resolve_matches(db, matches)).await?;
    Ok(Json(json!({ "total_matches": matches.len(), "matches": matches })))
}

// -- CRUD --

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    submission: Submission<FoundItemForm, MAX_IMAGES>,
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
    form: FoundItemForm,
    files: &[StoredFile],
) -> ApiResult<Value> {
    let form = validate(form)?;

    let category_id = form.category_id;
    let category = blocking(state, move |db| db.get_category(category_id))
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid category"))?;

    let user_id = user.id;
    let (item_name, description, location, found_date) =
        (form.item_name.clone(), form.description.clone(), form.location.clone(), form.found_date);
    let item_id = blocking(state, move |db| {
        db.create_found_item(&NewFoundItem {
            user_id,
            category_id,
            item_name: &item_name,
            description: description.as_deref(),
            location: &location,
            found_date: &found_date,
        })
    })
    .await?;
    info!("User {} reported found item {} ({})", user.id, item_id, form.item_name);

    let mut firestore_id = None;
    if !files.is_empty() {
        let doc = FoundItemDocument {
            item_name: &form.item_name,
            description: form.description.as_deref().unwrap_or_default(),
            location: &form.location,
            category: &category.name,
            reporter_id: user.id,
        };
        let registered = match ImageUpload::read_all(files).await {
            Ok(uploads) => state.ai.add_found_item(&doc, &uploads).await,
            Err(e) => Err(e),
        };

        let mut urls: Vec<String> = Vec::new();
        match registered {
            Ok(reg) => {
                firestore_id = Some(reg.item_id.clone());
                urls.extend(reg.image_url);
                urls.extend(reg.additional_images);
            }
            Err(e) => warn!("AI Layer registration failed for found item {}: {:#}", item_id, e),
        }

        let remote = !urls.is_empty();
        if !remote {
            urls = files.iter().map(|f| f.url.clone()).collect();
        }

        let fid = firestore_id.clone();
        blocking(state, move |db| {
            if let Some(fid) = &fid {
                db.set_found_item_firestore_id(item_id, fid)?;
            }
            for (i, url) in urls.iter().enumerate() {
                db.add_image(item_id, url, i == 0)?;
            }
            Ok(())
        })
        .await?;

        if remote {
            state.storage.remove_all(files).await;
        }
    }

    let item = blocking(state, move |db| load_item(db, item_id))
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("found item {} vanished after insert", item_id)))?;

    Ok(json!({
        "message": "Found item created successfully",
        "item": item,
        "firestore_id": firestore_id,
    }))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let item = blocking(&state, move |db| load_item(db, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Found item not found"))?;
    Ok(Json(json!({ "item": item })))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(form): Json<FoundItemForm>,
) -> ApiResult<impl IntoResponse> {
    let form = validate(form)?;
    let existing = managed_item(&state, &user, id, "Not authorized to update this item").await?;

    let category_id = form.category_id;
    let category = blocking(&state, move |db| db.get_category(category_id))
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid category"))?;

    let changes = FoundItemChanges {
        item_name: Some(form.item_name.clone()),
        category_id: Some(form.category_id),
        description: form.description_sent.then(|| form.description.clone()),
        location: Some(form.location.clone()),
        found_date: Some(form.found_date.clone()),
    };
    if !blocking(&state, move |db| db.update_found_item(id, changes)).await? {
        return Err(ApiError::not_found("Found item not found"));
    }

    if let Some(fid) = &existing.firestore_id {
        let fields = json!({
            "item_name": form.item_name,
            "description": form.description,
            "location": form.location,
            "category": category.name,
            "found_date": form.found_date,
        });
        if let Err(e) = state.ai.update_item(fid, &fields).await {
            warn!("AI Layer update failed for found item {}: {:#}", id, e);
        }
    }

    let item = blocking(&state, move |db| load_item(db, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Found item not found"))?;
    Ok(Json(json!({ "message": "Found item updated successfully", "item": item })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let existing = managed_item(&state, &user, id, "Not authorized to delete this item").await?;

    if let Some(fid) = &existing.firestore_id {
        if let Err(e) = state.ai.delete_item(fid).await {
            warn!("AI Layer delete failed for found item {}: {:#}", id, e);
        }
    }

    let (deleted, images) = blocking(&state, move |db| {
        let images = db.get_images_for_item(id)?;
        Ok((db.delete_found_item(id)?, images))
    })
    .await?;
    if !deleted {
        return Err(ApiError::not_found("Found item not found"));
    }

    for image in images.iter().filter(|i| i.is_local()) {
        state.storage.remove_url(&image.image_url).await;
    }
    info!("Deleted found item {}", id);
    Ok(Json(json!({ "message": "Found item deleted successfully" })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = req
        .status
        .as_deref()
        .and_then(FoundStatus::parse)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let existing = blocking(&state, move |db| {
        let Some(item) = db.get_found_item(id)? else {
            return Ok(None);
        };
        db.update_found_item_status(id, status)?;
        Ok(Some(item))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Found item not found"))?;

    if let Some(fid) = &existing.firestore_id {
        if let Err(e) = state.ai.update_item_status(fid, status.as_str()).await {
            warn!("AI Layer status update failed for found item {}: {:#}", id, e);
        }
    }

    Ok(Json(json!({
        "message": "Found item status updated successfully",
        "item": { "id": id, "status": status },
    })))
}

// -- Images --

pub async fn add_images(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    submission: Submission<NoFields, MAX_IMAGES>,
) -> ApiResult<impl IntoResponse> {
    let files = submission.files;
    match add_item_images(&state, &user, id, &files).await {
        Ok(body) => Ok(Json(body)),
        Err(e) => {
            state.storage.remove_all(&files).await;
            Err(e)
        }
    }
}

async fn add_item_images(state: &AppState, user: &CurrentUser, id: i64, files: &[StoredFile]) -> ApiResult<Value> {
    let item = managed_item(state, user, id, "Not authorized").await?;
    if files.is_empty() {
        return Err(ApiError::bad_request("No images provided"));
    }

    let mut urls = Vec::new();
    if let Some(fid) = &item.firestore_id {
        let added = match ImageUpload::read_all(files).await {
            Ok(uploads) => state.ai.add_item_images(fid, &uploads).await,
            Err(e) => Err(e),
        };
        match added {
            Ok(remote) => urls = remote,
            Err(e) => warn!("AI Layer image upload failed for found item {}: {:#}", id, e),
        }
    }

    let remote = !urls.is_empty();
    if !remote {
        urls = files.iter().map(|f| f.url.clone()).collect();
    }

    let (new_images, all_images) = blocking(state, move |db| {
        let has_primary = db.has_primary_image(id)?;
        let mut added = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            added.push(FoundItemImage::from(db.add_image(id, url, !has_primary && i == 0)?));
        }
        let all: Vec<FoundItemImage> = db
            .get_images_for_item(id)?
            .into_iter()
            .map(FoundItemImage::from)
            .collect();
        Ok((added, all))
    })
    .await?;

    if remote {
        state.storage.remove_all(files).await;
    }

    Ok(json!({
        "message": "Images added successfully",
        "new_images": new_images,
        "all_images": all_images,
    }))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let item = managed_item(&state, &user, id, "Not authorized").await?;

    let image = blocking(&state, move |db| db.get_image(image_id))
        .await?
        .filter(|img| img.found_item_id == id)
        .ok_or_else(|| ApiError::not_found("Image not found"))?;

    if image.is_local() {
        state.storage.remove_url(&image.image_url).await;
    } else if let Some(fid) = &item.firestore_id {
        if let Err(e) = state.ai.delete_item_image(fid, &image.image_url).await {
            warn!("AI Layer image delete failed for found item {}: {:#}", id, e);
        }
    }

    let remaining: Vec<FoundItemImage> = blocking(&state, move |db| {
        db.delete_image(&image)?;
        db.get_images_for_item(id)
    })
    .await?
    .into_iter()
    .map(FoundItemImage::from)
    .collect();

    Ok(Json(json!({
        "message": "Image deleted successfully",
        "remaining_images": remaining,
    })))
}

pub async fn set_primary_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let item = managed_item(&state, &user, id, "Not authorized").await?;

    let image = blocking(&state, move |db| db.get_image(image_id))
        .await?
        .filter(|img| img.found_item_id == id)
        .ok_or_else(|| ApiError::not_found("Image not found"))?;

    if image.is_primary {
        return Ok(Json(json!({
            "message": "Image is already set as primary",
            "image": FoundItemImage::from(image),
        })));
    }

    let image_url = image.image_url.clone();
    let images: Vec<FoundItemImage> = blocking(&state, move |db| {
        db.set_primary_image(id, image_id)?;
        db.get_images_for_item(id)
    })
    .await?
    .into_iter()
    .map(FoundItemImage::from)
    .collect();

    if let Some(fid) = &item.firestore_id {
        if let Err(e) = state.ai.set_primary_image(fid, &image_url).await {
            warn!("AI Layer primary image update failed for found item {}: {:#}", id, e);
        }
    }

    Ok(Json(json!({ "message": "Primary image set successfully", "images": images })))
}
