//! Integration tests for the listing creation -> validation -> read pipeline.
//! Exercises the public crate API the way `upload`, `listings::validate`,
//! `listings::read_assembler`, `storage`, and `error` hand off to each other,
//! without a live database, cache, bus, or S3 endpoint.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use listings_backend::db::models::{
    FileKind, FileState, ListingFileRow, ListingRow, ListingState, ListingWithFiles,
};
use listings_backend::error::{AppError, ErrorCode};
use listings_backend::listings::read_assembler::assemble;
use listings_backend::listings::validate::{validate_listing, validate_update, FileInput, ListingInput};
use listings_backend::storage::{S3Storage, StorageError};
use listings_backend::upload::path_belongs_to_user;

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

fn sample_row(id: Uuid, state: ListingState) -> ListingRow {
    ListingRow {
        id,
        seller_id: "user-1".to_string(),
        seller_display_name: "Seller One".to_string(),
        seller_username: "seller1".to_string(),
        seller_verified: false,
        title: "Articulated Dragon".to_string(),
        description: "A dragon model with moving joints and an articulated tail.".to_string(),
        categories: vec!["artistic".to_string()],
        license: "standard".to_string(),
        thumbnail_path: "2026/07/28/user-1/d1/images/a.png".to_string(),
        price_minor_units: 500,
        currency: Some("usd".to_string()),
        is_free: false,
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

/// A payload that passes `upload::build_key`-style path construction and then
/// `listings::validate`'s per-field and per-file checks end to end (spec §8
/// scenario 1: create succeeds, file ownership carries through unchanged).
#[test]
fn create_listing_payload_with_owned_files_passes_validation() {
    let user_id = "user-1";
    let model_path = "2026/07/28/user-1/draft-1/models/a1b2c3.stl".to_string();
    let image_path = "2026/07/28/user-1/draft-1/images/d4e5f6.png".to_string();

    assert!(path_belongs_to_user(&model_path, user_id));
    assert!(path_belongs_to_user(&image_path, user_id));

    let input = ListingInput {
        title: "Articulated Dragon",
        description: "A dragon model with moving joints and an articulated tail.",
        categories: &["artistic".to_string()],
        license: "standard",
        price_minor_units: 500,
        currency: Some("usd"),
        dimensions_present: false,
        dimensions: None,
        nozzle_temp_c: Some(210),
        recommended_materials: &["PLA".to_string()],
        hardware_items: &[],
        is_ai_generated: false,
        ai_model_name: None,
        files: &[
            FileInput { path: model_path, kind: FileKind::Model, size_bytes: 4096 },
            FileInput { path: image_path, kind: FileKind::Image, size_bytes: 2048 },
        ],
        user_id,
    };

    assert!(validate_listing(&input).is_ok());
}

/// A file path stamped with someone else's user id must fail validation even
/// when every other field is well-formed (spec §4.2 ownership check).
#[test]
fn create_listing_rejects_file_owned_by_another_user() {
    let input = ListingInput {
        title: "Articulated Dragon",
        description: "A dragon model with moving joints and an articulated tail.",
        categories: &["artistic".to_string()],
        license: "standard",
        price_minor_units: 0,
        currency: None,
        dimensions_present: false,
        dimensions: None,
        nozzle_temp_c: None,
        recommended_materials: &[],
        hardware_items: &[],
        is_ai_generated: false,
        ai_model_name: None,
        files: &[
            FileInput {
                path: "2026/07/28/someone-else/draft-1/models/a.stl".to_string(),
                kind: FileKind::Model,
                size_bytes: 10,
            },
            FileInput {
                path: "2026/07/28/user-1/draft-1/images/a.png".to_string(),
                kind: FileKind::Image,
                size_bytes: 10,
            },
        ],
        user_id: "user-1",
    };

    let err = validate_listing(&input).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

/// Update payloads re-run the same price/currency and AI-model invariants as
/// create, just against `Option<Option<_>>` patch fields (spec §4.2).
#[test]
fn update_reuses_create_invariants_for_price_and_ai_fields() {
    assert!(validate_update(Some(500), Some(None), None, None).is_err());
    assert!(validate_update(Some(500), Some(Some("usd")), None, None).is_ok());
    assert!(validate_update(None, None, Some(true), Some(None)).is_err());
    assert!(validate_update(None, None, Some(true), Some(Some("stable-diffusion"))).is_ok());
}

/// A listing still `PENDING_VALIDATION` carries no file URLs; once files are
/// `VALID` and the listing is `ACTIVE`, image files resolve to public CDN
/// URLs and model files resolve to signed private URLs (spec §4.6).
#[test]
fn read_assembly_reflects_file_and_listing_state() {
    let storage = storage();
    let listing_id = Uuid::new_v4();

    let pending_files = vec![ListingFileRow {
        id: Uuid::new_v4(),
        listing_id,
        path: "2026/07/28/user-1/draft-1/models/a.stl".to_string(),
        kind: FileKind::Model,
        size_bytes: 4096,
        metadata: None,
        state: FileState::Pending,
        error_message: None,
        is_generated: false,
        source_file_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }];
    let pending = assemble(
        &storage,
        &ListingWithFiles { listing: sample_row(listing_id, ListingState::PendingValidation), files: pending_files },
    );
    assert!(pending.files[0].url.is_none());
    assert_eq!(pending.state, "PendingValidation");

    let active_files = vec![
        ListingFileRow {
            id: Uuid::new_v4(),
            listing_id,
            path: "2026/07/28/user-1/draft-1/models/a.stl".to_string(),
            kind: FileKind::Model,
            size_bytes: 4096,
            metadata: None,
            state: FileState::Valid,
            error_message: None,
            is_generated: false,
            source_file_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        ListingFileRow {
            id: Uuid::new_v4(),
            listing_id,
            path: "2026/07/28/user-1/draft-1/images/a.png".to_string(),
            kind: FileKind::Image,
            size_bytes: 2048,
            metadata: None,
            state: FileState::Valid,
            error_message: None,
            is_generated: false,
            source_file_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
    ];
    let active = assemble(
        &storage,
        &ListingWithFiles { listing: sample_row(listing_id, ListingState::Active), files: active_files },
    );
    assert_eq!(active.state, "Active");
    assert!(active.files[0].url.is_some());
    assert_eq!(
        active.files[1].url.as_deref(),
        Some("https://cdn.example.test/2026/07/28/user-1/draft-1/images/a.png")
    );
}

/// Storage failures classify into the two domain categories the HTTP
/// boundary cares about; everything else collapses to a generic internal
/// error rather than leaking storage-specific detail (spec §4.7, §7).
#[test]
fn storage_error_classification_maps_to_the_right_error_code() {
    let not_found: AppError = StorageError::NotFound("some/key.stl".to_string()).into();
    assert_eq!(not_found.code(), ErrorCode::NotFound);

    let access_denied: AppError = StorageError::AccessDenied("some/key.stl".to_string()).into();
    assert_eq!(access_denied.code(), ErrorCode::Internal);

    let other: AppError = StorageError::Other(anyhow::anyhow!("boom")).into();
    assert_eq!(other.code(), ErrorCode::Internal);
}

/// Every `AppError` — including the unauthorized case auth middleware raises
/// directly — serializes through the same `{error_code, message, request_id}`
/// envelope, never a bare-text body (spec §7).
#[tokio::test]
async fn app_error_responses_share_one_json_envelope() {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    let response = AppError::unauthorized("missing authorization token").into_response();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["error_code"], "UNAUTHORIZED");
    assert_eq!(envelope["message"], "missing authorization token");
    assert!(envelope["request_id"].is_string());
}
