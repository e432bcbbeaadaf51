use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Role;

// -- JWT Claims --

/// Claims carried by every access token. The role is deliberately not part of
/// the token: the auth middleware reloads it from the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub exp: usize,
}

/// Accepts a JSON string or number and keeps it as text. Form bodies and
/// mobile clients send ids and priorities either way.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Text(s) => s,
        Loose::Int(i) => i.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Bool(b) => b.to_string(),
    }))
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: LoginUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyWhatsappRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub password: Option<String>,
}

// -- Categories --

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub priority: Option<String>,
}

// -- Items --

/// Fields of a found-item report. Arrives as JSON or as the text parts of a
/// multipart form.
#[derive(Debug, Default, Deserialize)]
pub struct FoundItemForm {
    #[serde(default, deserialize_with = "loose_string")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub found_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LostItemForm {
    #[serde(default, deserialize_with = "loose_string")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub last_seen_location: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lost_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub reward: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FindMatchesRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub image_url: Option<String>,
}

// -- Claims --

#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lost_location: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub lost_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub additional_proof: Option<String>,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
pub struct RoleRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub role: Option<String>,
}

// -- Listing --

/// Query string shared by every paginated listing. Values stay textual so a
/// malformed number falls back to its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPagination {
    pub page: u32,
    pub limit: u32,
    pub total_claims: i64,
    pub total_pages: i64,
}

/// Echo of the filters that were actually applied to a listing.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
}

// -- Statistics --

#[derive(Debug, Clone, Serialize)]
pub struct UserTotals {
    pub total: i64,
    pub admin_count: i64,
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoundItemStats {
    pub total: i64,
    pub pending_count: i64,
    pub approved_count: i64,
    pub claimed_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LostItemStats {
    pub total: i64,
    pub active_count: i64,
    pub found_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimStats {
    pub total: i64,
    pub pending_count: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCategory {
    pub id: i64,
    pub name: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentItem {
    pub id: i64,
    pub item_name: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub users: UserTotals,
    pub found_items: FoundItemStats,
    pub lost_items: LostItemStats,
    pub claims: ClaimStats,
    pub top_categories: Vec<TopCategory>,
    pub recent_items: Vec<RecentItem>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub found_items: i64,
    pub lost_items: i64,
    pub matched_items: i64,
    pub pending_claims: i64,
}

// -- Sync --

#[derive(Debug, Clone, Serialize)]
pub struct SyncDetail {
    pub id: i64,
    pub item_name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firestore_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub synchronized: usize,
    pub failed: usize,
    pub details: Vec<SyncDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_fields_accept_numbers_and_strings() {
        let req: ClaimRequest =
            serde_json::from_str(r#"{"item_id": 7, "description": "my wallet"}"#).unwrap();
        assert_eq!(req.item_id.as_deref(), Some("7"));
        assert_eq!(req.description.as_deref(), Some("my wallet"));
        assert!(req.lost_date.is_none());

        let req: CategoryRequest =
            serde_json::from_str(r#"{"name": "Bags", "priority": "3"}"#).unwrap();
        assert_eq!(req.priority.as_deref(), Some("3"));
    }

    #[test]
    fn test_null_is_treated_as_missing() {
        let req: LoginRequest = serde_json::from_str(r#"{"email": null}"#).unwrap();
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let p = Pagination { page: 2, limit: 10, total_items: 11, total_pages: 2 };
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["totalItems"], 11);
        assert_eq!(v["totalPages"], 2);
    }
}
