use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// -- Status vocabularies --

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse a wire value. Unknown values yield `None`.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Role {
    User => "user",
    Admin => "admin",
});

string_enum!(
    /// Lifecycle of a reported found item: `pending → approved → claimed | returned | rejected`.
    FoundStatus {
        Pending => "pending",
        Approved => "approved",
        Claimed => "claimed",
        Returned => "returned",
        Rejected => "rejected",
    }
);

impl FoundStatus {
    /// Only items that are still waiting for their owner accept claims.
    pub fn is_claimable(&self) -> bool {
        matches!(self, FoundStatus::Pending | FoundStatus::Approved)
    }
}

string_enum!(LostStatus {
    Active => "active",
    Found => "found",
    Closed => "closed",
});

string_enum!(ClaimStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

// -- Entities --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundItemImage {
    pub id: i64,
    pub found_item_id: i64,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundItem {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: String,
    pub description: Option<String>,
    pub location: String,
    pub found_date: NaiveDate,
    pub status: FoundStatus,
    pub image_url: Option<String>,
    pub firestore_id: Option<String>,
    pub category_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<FoundItemImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LostItem {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub item_name: String,
    pub description: Option<String>,
    pub last_seen_location: String,
    pub lost_date: NaiveDate,
    pub reward: Option<String>,
    pub status: LostStatus,
    pub image_url: Option<String>,
    pub firestore_id: Option<String>,
    pub needs_sync: bool,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub category_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A claim joined with its claimant, the claimed found item and that item's
/// category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemClaim {
    pub id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub description: String,
    pub lost_location: Option<String>,
    pub lost_date: Option<NaiveDate>,
    pub additional_proof: Option<String>,
    pub status: ClaimStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub claimer_name: String,
    pub claimer_email: String,
    pub item_name: String,
    pub image_url: Option<String>,
    pub category_id: i64,
    pub category_name: String,
    pub found_location: String,
    pub found_date: NaiveDate,
}
