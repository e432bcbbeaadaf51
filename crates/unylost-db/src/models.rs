//! Database row types. These map directly to SQLite rows and stay distinct
//! from the `unylost-types` wire models; the `From` impls below do the mapping.

use tracing::warn;
use unylost_types::models::{
    Category, ClaimStatus, FoundItem, FoundItemImage, FoundStatus, ItemClaim, LostItem,
    LostStatus, Role, UserProfile,
};

use crate::{parse_date, parse_timestamp};

pub struct UserRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or_else(|| {
            warn!("Unknown role '{}' on user {}", self.role, self.id);
            Role::User
        })
    }
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            role: row.role(),
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            is_verified: row.is_verified,
            last_login: row.last_login.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

pub struct NewUser<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone_number: Option<&'a str>,
    pub address: Option<&'a str>,
    pub role: Role,
    pub is_verified: bool,
    pub verification_token: Option<&'a str>,
}

pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub priority: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            icon: row.icon,
            priority: row.priority,
        }
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub priority: Option<i64>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.icon.is_none()
            && self.priority.is_none()
    }
}

pub struct FoundItemRow {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: String,
    pub description: Option<String>,
    pub location: String,
    pub found_date: String,
    pub status: String,
    pub image_url: Option<String>,
    pub firestore_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: String,
    pub reporter_name: String,
}

impl FoundItemRow {
    pub fn status(&self) -> FoundStatus {
        FoundStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Unknown status '{}' on found item {}", self.status, self.id);
            FoundStatus::Pending
        })
    }

    /// Wire model with its images attached.
    pub fn into_item(self, images: Vec<FoundItemImage>) -> FoundItem {
        FoundItem {
            id: self.id,
            user_id: self.user_id,
            category_id: self.category_id,
            status: self.status(),
            found_date: parse_date(&self.found_date),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            item_name: self.item_name,
            description: self.description,
            location: self.location,
            image_url: self.image_url,
            firestore_id: self.firestore_id,
            category_name: self.category_name,
            reporter_name: Some(self.reporter_name),
            images,
        }
    }
}

pub struct NewFoundItem<'a> {
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: &'a str,
    pub description: Option<&'a str>,
    pub location: &'a str,
    pub found_date: &'a str,
}

#[derive(Debug, Default)]
pub struct FoundItemChanges {
    pub item_name: Option<String>,
    pub category_id: Option<i64>,
    /// `Some(None)` clears the column.
    pub description: Option<Option<String>>,
    pub location: Option<String>,
    pub found_date: Option<String>,
}

impl FoundItemChanges {
    pub fn is_empty(&self) -> bool {
        self.item_name.is_none()
            && self.category_id.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.found_date.is_none()
    }
}

pub struct ImageRow {
    pub id: i64,
    pub found_item_id: i64,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: String,
}

impl ImageRow {
    pub fn is_local(&self) -> bool {
        self.image_url.starts_with("/uploads/")
    }
}

impl From<ImageRow> for FoundItemImage {
    fn from(row: ImageRow) -> Self {
        FoundItemImage {
            id: row.id,
            found_item_id: row.found_item_id,
            is_primary: row.is_primary,
            created_at: parse_timestamp(&row.created_at),
            image_url: row.image_url,
        }
    }
}

pub struct LostItemRow {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: String,
    pub description: Option<String>,
    pub last_seen_location: String,
    pub lost_date: String,
    pub reward: Option<String>,
    pub status: String,
    pub image_url: Option<String>,
    pub firestore_id: Option<String>,
    pub needs_sync: bool,
    pub last_sync_attempt: Option<String>,
    pub sync_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: String,
    pub owner_name: String,
}

impl LostItemRow {
    pub fn status(&self) -> LostStatus {
        LostStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Unknown status '{}' on lost item {}", self.status, self.id);
            LostStatus::Active
        })
    }
}

impl From<LostItemRow> for LostItem {
    fn from(row: LostItemRow) -> Self {
        LostItem {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            status: row.status(),
            lost_date: parse_date(&row.lost_date),
            last_sync_attempt: row.last_sync_attempt.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            item_name: row.item_name,
            description: row.description,
            last_seen_location: row.last_seen_location,
            reward: row.reward,
            image_url: row.image_url,
            firestore_id: row.firestore_id,
            needs_sync: row.needs_sync,
            sync_error: row.sync_error,
            category_name: row.category_name,
            owner_name: Some(row.owner_name),
        }
    }
}

pub struct NewLostItem<'a> {
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: &'a str,
    pub description: Option<&'a str>,
    pub last_seen_location: &'a str,
    pub lost_date: &'a str,
    pub reward: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct LostItemChanges {
    pub item_name: Option<String>,
    pub category_id: Option<i64>,
    /// `Some(None)` clears the column.
    pub description: Option<Option<String>>,
    pub last_seen_location: Option<String>,
    pub lost_date: Option<String>,
    pub image_url: Option<String>,
    pub reward: Option<String>,
    pub status: Option<LostStatus>,
}

impl LostItemChanges {
    pub fn is_empty(&self) -> bool {
        self.item_name.is_none()
            && self.category_id.is_none()
            && self.description.is_none()
            && self.last_seen_location.is_none()
            && self.lost_date.is_none()
            && self.image_url.is_none()
            && self.reward.is_none()
            && self.status.is_none()
    }
}

pub struct ClaimRow {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub description: String,
    pub lost_location: Option<String>,
    pub lost_date: Option<String>,
    pub additional_proof: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub claimer_name: String,
    pub claimer_email: String,
    pub item_name: String,
    pub image_url: Option<String>,
    pub category_id: i64,
    pub category_name: String,
    pub found_location: String,
    pub found_date: String,
}

impl ClaimRow {
    pub fn status(&self) -> ClaimStatus {
        ClaimStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Unknown status '{}' on claim {}", self.status, self.id);
            ClaimStatus::Pending
        })
    }
}

impl From<ClaimRow> for ItemClaim {
    fn from(row: ClaimRow) -> Self {
        ItemClaim {
            id: row.id,
            user_id: row.user_id,
            item_id: row.item_id,
            status: row.status(),
            lost_date: row.lost_date.as_deref().map(parse_date),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            found_date: parse_date(&row.found_date),
            description: row.description,
            lost_location: row.lost_location,
            additional_proof: row.additional_proof,
            admin_notes: row.admin_notes,
            claimer_name: row.claimer_name,
            claimer_email: row.claimer_email,
            item_name: row.item_name,
            image_url: row.image_url,
            category_id: row.category_id,
            category_name: row.category_name,
            found_location: row.found_location,
        }
    }
}

pub struct NewClaim<'a> {
    pub user_id: i64,
    pub item_id: i64,
    pub description: &'a str,
    pub lost_location: Option<&'a str>,
    pub lost_date: Option<&'a str>,
    pub additional_proof: Option<&'a str>,
}

/// Listing filters shared by found and lost items. Dates compare against the
/// item's found/lost date; for claims they compare against `created_at`.
#[derive(Debug, Default, Clone)]
pub struct ListFilters {
    pub status: Option<String>,
    pub category_id: Option<i64>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub user_id: Option<i64>,
    pub item_id: Option<i64>,
}

/// Result of approving a claim.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub item_id: i64,
    pub rejected_claim_ids: Vec<i64>,
}
