//! Listing data model.
//! Mission: Represent the listing lifecycle and its files (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `PENDING_VALIDATION -> ACTIVE | REJECTED`, plus the admin-only `HIDDEN`
/// state. See [`crate::listings::orchestrator`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingState {
    PendingValidation,
    Active,
    Rejected,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    Model,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FileState {
    Pending,
    Valid,
    Invalid,
    Failed,
}

/// Physical dimensions in millimetres, stored as JSONB with `width`/`depth`/
/// `height` keys and flattened to `x`/`y`/`z` on read (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(rename = "width")]
    pub x: f64,
    #[serde(rename = "depth")]
    pub y: f64,
    #[serde(rename = "height")]
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleMetadata {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub sale_price_minor_units: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerInfo {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub verified: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: Uuid,
    pub seller_id: String,
    pub seller_display_name: String,
    pub seller_username: String,
    pub seller_verified: bool,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub license: String,
    pub thumbnail_path: String,
    pub price_minor_units: i64,
    pub currency: Option<String>,
    pub is_free: bool,
    pub sale: Option<serde_json::Value>,
    pub is_physical: bool,
    pub dimensions_mm: Option<serde_json::Value>,
    pub weight_grams: Option<f64>,
    pub nozzle_temp_c: Option<i32>,
    pub recommended_materials: Vec<String>,
    pub is_multicolor: bool,
    pub requires_assembly: bool,
    pub hardware_items: Vec<String>,
    pub remixing_allowed: bool,
    pub parent_listing_id: Option<Uuid>,
    pub is_nsfw: bool,
    pub is_ai_generated: bool,
    pub ai_model_name: Option<String>,
    pub state: ListingState,
    pub likes_count: i64,
    pub downloads_count: i64,
    pub comments_count: i64,
    pub trace_id: String,
    pub authorized_party: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ListingRow {
    pub fn seller(&self) -> SellerInfo {
        SellerInfo {
            id: self.seller_id.clone(),
            display_name: self.seller_display_name.clone(),
            username: self.seller_username.clone(),
            verified: self.seller_verified,
        }
    }

    /// Parse `dimensions_mm` defensively — a malformed or stale shape never
    /// crashes a handler, it just reads as absent (design note).
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions_mm.as_ref().and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn sale_metadata(&self) -> Option<SaleMetadata> {
        self.sale.as_ref().and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingFileRow {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub path: String,
    pub kind: FileKind,
    pub size_bytes: i64,
    pub metadata: Option<serde_json::Value>,
    pub state: FileState,
    pub error_message: Option<String>,
    pub is_generated: bool,
    pub source_file_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listing together with its (non-deleted) files — the unit the
/// orchestrator and read assembler operate on.
#[derive(Debug, Clone)]
pub struct ListingWithFiles {
    pub listing: ListingRow,
    pub files: Vec<ListingFileRow>,
}

impl ListingWithFiles {
    pub fn model_files(&self) -> impl Iterator<Item = &ListingFileRow> {
        self.files.iter().filter(|f| f.kind == FileKind::Model)
    }

    pub fn image_files(&self) -> impl Iterator<Item = &ListingFileRow> {
        self.files.iter().filter(|f| f.kind == FileKind::Image)
    }

    pub fn all_valid(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|f| f.state == FileState::Valid)
    }

    pub fn any_invalid(&self) -> bool {
        self.files.iter().any(|f| f.state == FileState::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_valid_requires_at_least_one_file() {
        let listing = sample_listing_with_files(vec![]);
        assert!(!listing.all_valid());
    }

    #[test]
    fn all_valid_true_when_every_file_valid() {
        let listing = sample_listing_with_files(vec![FileState::Valid, FileState::Valid]);
        assert!(listing.all_valid());
    }

    #[test]
    fn all_valid_false_when_any_pending() {
        let listing = sample_listing_with_files(vec![FileState::Valid, FileState::Pending]);
        assert!(!listing.all_valid());
    }

    #[test]
    fn any_invalid_detects_rejection_trigger() {
        let listing = sample_listing_with_files(vec![FileState::Valid, FileState::Invalid]);
        assert!(listing.any_invalid());
    }

    fn sample_listing_with_files(states: Vec<FileState>) -> ListingWithFiles {
        let listing_id = Uuid::new_v4();
        let files = states
            .into_iter()
            .map(|state| ListingFileRow {
                id: Uuid::new_v4(),
                listing_id,
                path: "2025/01/01/u/d/models/a.stl".to_string(),
                kind: FileKind::Model,
                size_bytes: 1024,
                metadata: None,
                state,
                error_message: None,
                is_generated: false,
                source_file_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect();

        ListingWithFiles {
            listing: ListingRow {
                id: listing_id,
                seller_id: "seller-1".to_string(),
                seller_display_name: "Seller One".to_string(),
                seller_username: "seller1".to_string(),
                seller_verified: false,
                title: "Articulated Dragon".to_string(),
                description: "A dragon model with moving joints and articulated tail.".to_string(),
                categories: vec!["artistic".to_string()],
                license: "standard".to_string(),
                thumbnail_path: "2025/01/01/u/d/images/a.png".to_string(),
                price_minor_units: 0,
                currency: None,
                is_free: true,
                sale: None,
                is_physical: true,
                dimensions_mm: None,
                weight_grams: None,
                nozzle_temp_c: None,
                recommended_materials: vec![],
                is_multicolor: false,
                requires_assembly: false,
                hardware_items: vec![],
                remixing_allowed: true,
                parent_listing_id: None,
                is_nsfw: false,
                is_ai_generated: false,
                ai_model_name: None,
                state: ListingState::PendingValidation,
                likes_count: 0,
                downloads_count: 0,
                comments_count: 0,
                trace_id: "trace-1".to_string(),
                authorized_party: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                last_indexed_at: None,
                deleted_at: None,
            },
            files,
        }
    }
}
