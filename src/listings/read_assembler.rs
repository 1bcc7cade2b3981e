//! Read assembler.
//! Mission: Turn a listing row plus its files into the response the web UI
//! consumes — signed URLs for private files, public URLs for public ones,
//! flattened dimensions (spec §4.6).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::{FileKind, FileState, ListingFileRow, ListingWithFiles, SaleMetadata, SellerInfo};
use crate::storage::{S3Storage, StorageAdapter, StorageBucket};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: String,
    pub kind: FileKind,
    pub state: FileState,
    pub size_bytes: i64,
    pub error_message: Option<String>,
    pub is_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionsResponse {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub id: String,
    pub seller: SellerInfo,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub license: String,
    pub thumbnail_url: String,
    pub price_minor_units: i64,
    pub currency: Option<String>,
    pub is_free: bool,
    pub sale: Option<SaleMetadata>,
    pub is_physical: bool,
    pub dimensions_mm: Option<DimensionsResponse>,
    pub weight_grams: Option<f64>,
    pub nozzle_temp_c: Option<i32>,
    pub recommended_materials: Vec<String>,
    pub is_multicolor: bool,
    pub requires_assembly: bool,
    pub hardware_items: Vec<String>,
    pub remixing_allowed: bool,
    pub parent_listing_id: Option<String>,
    pub is_nsfw: bool,
    pub is_ai_generated: bool,
    pub ai_model_name: Option<String>,
    pub state: String,
    pub likes_count: i64,
    pub downloads_count: i64,
    pub comments_count: i64,
    pub files: Vec<FileResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Build the full read-path response for a listing and its files.
pub fn assemble(storage: &Arc<S3Storage>, listing: &ListingWithFiles) -> ListingResponse {
    let row = &listing.listing;
    let dimensions = row.dimensions();

    ListingResponse {
        id: row.id.to_string(),
        seller: row.seller(),
        title: row.title.clone(),
        description: row.description.clone(),
        categories: row.categories.clone(),
        license: row.license.clone(),
        thumbnail_url: storage.public_url(&row.thumbnail_path),
        price_minor_units: row.price_minor_units,
        currency: row.currency.clone(),
        is_free: row.is_free,
        sale: row.sale_metadata(),
        is_physical: row.is_physical,
        dimensions_mm: dimensions.map(|d| DimensionsResponse { x: d.x, y: d.y, z: d.z }),
        weight_grams: row.weight_grams,
        nozzle_temp_c: row.nozzle_temp_c,
        recommended_materials: row.recommended_materials.clone(),
        is_multicolor: row.is_multicolor,
        requires_assembly: row.requires_assembly,
        hardware_items: row.hardware_items.clone(),
        remixing_allowed: row.remixing_allowed,
        parent_listing_id: row.parent_listing_id.map(|id| id.to_string()),
        is_nsfw: row.is_nsfw,
        is_ai_generated: row.is_ai_generated,
        ai_model_name: row.ai_model_name.clone(),
        state: format!("{:?}", row.state),
        likes_count: row.likes_count,
        downloads_count: row.downloads_count,
        comments_count: row.comments_count,
        files: listing.files.iter().map(|f| assemble_file(storage, f)).collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn assemble_file(storage: &Arc<S3Storage>, file: &ListingFileRow) -> FileResponse {
    let url = if file.state == FileState::Valid {
        match file.kind {
            FileKind::Model => storage.presign_get(StorageBucket::Private, &file.path).ok(),
            FileKind::Image => Some(storage.public_url(&file.path)),
        }
    } else {
        None
    };

    FileResponse {
        id: file.id.to_string(),
        kind: file.kind,
        state: file.state,
        size_bytes: file.size_bytes,
        error_message: file.error_message.clone(),
        is_generated: file.is_generated,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ListingRow, ListingState};
    use chrono::Utc;
    use uuid::Uuid;

    fn storage() -> Arc<S3Storage> {
        Arc::new(
            S3Storage::new(
                "https://s3.example.test",
                "us-east-1",
                "test-key",
                "test-secret",
                "incoming-files",
                "private-files",
                "https://cdn.example.test",
            )
            .unwrap(),
        )
    }

    fn sample_row(state: ListingState) -> ListingRow {
        ListingRow {
            id: Uuid::new_v4(),
            seller_id: "seller-1".to_string(),
            seller_display_name: "Seller One".to_string(),
            seller_username: "seller1".to_string(),
            seller_verified: false,
            title: "Articulated Dragon".to_string(),
            description: "A dragon model with moving joints.".to_string(),
            categories: vec!["artistic".to_string()],
            license: "standard".to_string(),
            thumbnail_path: "2026/07/28/user-1/d1/images/a.png".to_string(),
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
            state,
            likes_count: 0,
            downloads_count: 0,
            comments_count: 0,
            trace_id: "trace-1".to_string(),
            authorized_party: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_indexed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn invalid_files_carry_no_url() {
        let storage = storage();
        let listing_id = Uuid::new_v4();
        let mut row = sample_row(ListingState::PendingValidation);
        row.id = listing_id;
        let files = vec![ListingFileRow {
            id: Uuid::new_v4(),
            listing_id,
            path: "2026/07/28/user-1/d1/models/a.stl".to_string(),
            kind: FileKind::Model,
            size_bytes: 10,
            metadata: None,
            state: FileState::Pending,
            error_message: None,
            is_generated: false,
            source_file_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }];

        let response = assemble(&storage, &ListingWithFiles { listing: row, files });
        assert!(response.files[0].url.is_none());
    }

    #[test]
    fn valid_image_file_gets_public_url() {
        let storage = storage();
        let listing_id = Uuid::new_v4();
        let mut row = sample_row(ListingState::Active);
        row.id = listing_id;
        let files = vec![ListingFileRow {
            id: Uuid::new_v4(),
            listing_id,
            path: "2026/07/28/user-1/d1/images/a.png".to_string(),
            kind: FileKind::Image,
            size_bytes: 10,
            metadata: None,
            state: FileState::Valid,
            error_message: None,
            is_generated: false,
            source_file_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }];

        let response = assemble(&storage, &ListingWithFiles { listing: row, files });
        assert_eq!(
            response.files[0].url.as_deref(),
            Some("https://cdn.example.test/2026/07/28/user-1/d1/images/a.png")
        );
    }
}
