use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use unylost_db::models::CategoryChanges;
use unylost_types::api::CategoryRequest;
use unylost_types::models::Category;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};
use crate::validation::Checks;

/// Shared by create and update; returns the parsed priority.
fn validate(req: &CategoryRequest) -> ApiResult<Option<i64>> {
    let mut checks = Checks::new();
    checks.required("name", req.name.as_deref(), "Nama kategori harus diisi");
    let priority = checks.non_negative_int(
        "priority",
        req.priority.as_deref(),
        "Prioritas harus berupa angka positif",
    );
    checks.finish()?;
    Ok(priority)
}

pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let categories: Vec<Category> = blocking(&state, |db| db.list_categories())
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(Json(json!({ "categories": categories })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let (category, (found, lost)) = blocking(&state, move |db| {
        let Some(category) = db.get_category(id)? else {
            return Ok(None);
        };
        Ok(Some((category, db.category_item_counts(id)?)))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let mut body = serde_json::to_value(Category::from(category))?;
    body["foundItemCount"] = json!(found);
    body["lostItemCount"] = json!(lost);
    Ok(Json(json!({ "category": body })))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let priority = validate(&req)?.unwrap_or(0);
    let name = req.name.unwrap_or_default().trim().to_string();

    let category = blocking(&state, move |db| {
        let id = db.create_category(&name, req.description.as_deref(), req.icon.as_deref(), priority)?;
        db.get_category(id)
    })
    .await?
    .map(Category::from)
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("category vanished after insert")))?;

    info!("Created category {} ({})", category.id, category.name);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Category created successfully", "category": category })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let priority = validate(&req)?;
    let changes = CategoryChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        icon: req.icon.filter(|i| !i.is_empty()),
        priority,
    };

    let category = blocking(&state, move |db| {
        if !db.update_category(id, changes)? {
            return Ok(None);
        }
        db.get_category(id)
    })
    .await?
    .map(Category::from)
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(json!({ "message": "Category updated successfully", "category": category })))
}

/// Categories still referenced by items cannot be removed.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let (found, lost) = blocking(&state, move |db| {
        if !db.category_exists(id)? {
            return Ok(None);
        }
        Ok(Some(db.category_item_counts(id)?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    if found > 0 || lost > 0 {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Cannot delete category with associated items",
                "foundItemCount": found,
                "lostItemCount": lost,
            })),
        ));
    }

    if !blocking(&state, move |db| db.delete_category(id)).await? {
        return Err(ApiError::not_found("Category not found"));
    }
    info!("Deleted category {}", id);
    Ok((StatusCode::OK, Json(json!({ "message": "Category deleted successfully" }))))
}
