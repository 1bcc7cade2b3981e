//! Listing repository.
//! Mission: Transactional reads/writes over `listings` and `listing_files`,
//! including the atomic fan-in promotion rule that resolves a listing's
//! lifecycle state as its files finish validation (spec §9, Open Question 1).

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::models::{FileKind, FileState, ListingFileRow, ListingRow, ListingState, ListingWithFiles};

/// One file to attach to a listing at creation time.
pub struct NewFile {
    pub path: String,
    pub kind: FileKind,
    pub size_bytes: i64,
    pub metadata: Option<serde_json::Value>,
}

pub struct NewListing {
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
    pub trace_id: String,
    pub authorized_party: Option<String>,
    pub files: Vec<NewFile>,
}

/// Create a listing and its files in one transaction so a crash between the
/// two inserts never leaves a listing with no files (spec §4.1).
pub async fn create_listing(pool: &PgPool, new: NewListing) -> AppResult<ListingWithFiles> {
    let mut tx = pool.begin().await?;

    let listing: ListingRow = sqlx::query_as(
        r#"
        INSERT INTO listings (
            seller_id, seller_display_name, seller_username, seller_verified,
            title, description, categories, license, thumbnail_path,
            price_minor_units, currency, is_free,
            is_physical, dimensions_mm, weight_grams, nozzle_temp_c,
            recommended_materials, is_multicolor, requires_assembly, hardware_items,
            remixing_allowed, parent_listing_id,
            is_nsfw, is_ai_generated, ai_model_name,
            trace_id, authorized_party
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
        )
        RETURNING *
        "#,
    )
    .bind(&new.seller_id)
    .bind(&new.seller_display_name)
    .bind(&new.seller_username)
    .bind(new.seller_verified)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.categories)
    .bind(&new.license)
    .bind(&new.thumbnail_path)
    .bind(new.price_minor_units)
    .bind(&new.currency)
    .bind(new.is_free)
    .bind(new.is_physical)
    .bind(&new.dimensions_mm)
    .bind(new.weight_grams)
    .bind(new.nozzle_temp_c)
    .bind(&new.recommended_materials)
    .bind(new.is_multicolor)
    .bind(new.requires_assembly)
    .bind(&new.hardware_items)
    .bind(new.remixing_allowed)
    .bind(new.parent_listing_id)
    .bind(new.is_nsfw)
    .bind(new.is_ai_generated)
    .bind(&new.ai_model_name)
    .bind(&new.trace_id)
    .bind(&new.authorized_party)
    .fetch_one(&mut *tx)
    .await?;

    let mut files = Vec::with_capacity(new.files.len());
    for file in &new.files {
        let row: ListingFileRow = sqlx::query_as(
            r#"
            INSERT INTO listing_files (listing_id, path, kind, size_bytes, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(listing.id)
        .bind(&file.path)
        .bind(file.kind)
        .bind(file.size_bytes)
        .bind(&file.metadata)
        .fetch_one(&mut *tx)
        .await?;
        files.push(row);
    }

    tx.commit().await?;
    Ok(ListingWithFiles { listing, files })
}

pub async fn get_listing(pool: &PgPool, id: Uuid) -> AppResult<ListingWithFiles> {
    let listing: ListingRow = sqlx::query_as(
        "SELECT * FROM listings WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("listing not found"))?;

    let files: Vec<ListingFileRow> = sqlx::query_as(
        "SELECT * FROM listing_files WHERE listing_id = $1 ORDER BY created_at ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ListingWithFiles { listing, files })
}

pub async fn list_for_seller(pool: &PgPool, seller_id: &str, state: Option<ListingState>) -> AppResult<Vec<ListingRow>> {
    let rows: Vec<ListingRow> = match state {
        Some(state) => {
            sqlx::query_as(
                "SELECT * FROM listings WHERE seller_id = $1 AND state = $2 AND deleted_at IS NULL ORDER BY created_at DESC",
            )
            .bind(seller_id)
            .bind(state)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM listings WHERE seller_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC",
            )
            .bind(seller_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

pub async fn list_active(pool: &PgPool, limit: i64, offset: i64) -> AppResult<Vec<ListingRow>> {
    let rows: Vec<ListingRow> = sqlx::query_as(
        "SELECT * FROM listings WHERE state = 'ACTIVE' AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Patch fields on a listing the seller is allowed to edit after creation.
/// Files and lifecycle state are not touched here.
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub price_minor_units: Option<i64>,
    pub currency: Option<Option<String>>,
    pub is_free: Option<bool>,
    pub sale: Option<Option<serde_json::Value>>,
}

pub async fn update_listing(pool: &PgPool, id: Uuid, patch: ListingPatch) -> AppResult<ListingRow> {
    let current: ListingRow = sqlx::query_as("SELECT * FROM listings WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    let row: ListingRow = sqlx::query_as(
        r#"
        UPDATE listings SET
            title = $2,
            description = $3,
            categories = $4,
            price_minor_units = $5,
            currency = $6,
            is_free = $7,
            sale = $8,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(patch.title.unwrap_or(current.title))
    .bind(patch.description.unwrap_or(current.description))
    .bind(patch.categories.unwrap_or(current.categories))
    .bind(patch.price_minor_units.unwrap_or(current.price_minor_units))
    .bind(patch.currency.unwrap_or(current.currency))
    .bind(patch.is_free.unwrap_or(current.is_free))
    .bind(patch.sale.unwrap_or(current.sale))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn soft_delete(pool: &PgPool, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE listings SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("listing not found"));
    }
    Ok(())
}

/// Mark a file valid. If this was the last file awaiting validation, promote
/// the listing to `ACTIVE` in the same transaction — the fan-in is atomic
/// because the listing row is locked for the duration of the check.
pub async fn mark_file_valid(pool: &PgPool, file_id: Uuid) -> AppResult<ListingWithFiles> {
    let mut tx = pool.begin().await?;

    let file: ListingFileRow = sqlx::query_as(
        "UPDATE listing_files SET state = 'VALID', error_message = NULL, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(file_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("file not found"))?;

    let listing = promote_if_ready(&mut tx, file.listing_id).await?;
    tx.commit().await?;
    Ok(listing)
}

/// Mark a file invalid and reject the listing outright — one bad file is
/// enough to fail the whole listing (resolved Open Question: no partial
/// publish).
pub async fn mark_file_invalid(pool: &PgPool, file_id: Uuid, error_message: &str) -> AppResult<ListingWithFiles> {
    let mut tx = pool.begin().await?;

    let file: ListingFileRow = sqlx::query_as(
        "UPDATE listing_files SET state = 'INVALID', error_message = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(file_id)
    .bind(error_message)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("file not found"))?;

    let listing = reject(&mut tx, file.listing_id).await?;
    tx.commit().await?;
    Ok(listing)
}

/// Mark a file failed (validator exhausted its retries) — treated the same
/// as an invalid file for the purposes of listing promotion.
pub async fn mark_file_failed(pool: &PgPool, file_id: Uuid, error_message: &str) -> AppResult<ListingWithFiles> {
    let mut tx = pool.begin().await?;

    let file: ListingFileRow = sqlx::query_as(
        "UPDATE listing_files SET state = 'FAILED', error_message = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(file_id)
    .bind(error_message)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("file not found"))?;

    let listing = reject(&mut tx, file.listing_id).await?;
    tx.commit().await?;
    Ok(listing)
}

/// Last-writer-wins: bump `last_indexed_at` unconditionally. Out-of-order
/// index acks are harmless, the search document is idempotent by id
/// (resolved Open Question 2).
pub async fn mark_indexed(pool: &PgPool, listing_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE listings SET last_indexed_at = now() WHERE id = $1")
        .bind(listing_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn promote_if_ready(tx: &mut Transaction<'_, Postgres>, listing_id: Uuid) -> AppResult<ListingWithFiles> {
    let listing: ListingRow = sqlx::query_as("SELECT * FROM listings WHERE id = $1 FOR UPDATE")
        .bind(listing_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    let files: Vec<ListingFileRow> = sqlx::query_as("SELECT * FROM listing_files WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_all(&mut **tx)
        .await?;

    let listing = if listing.state == ListingState::PendingValidation
        && !files.is_empty()
        && files.iter().all(|f| f.state == FileState::Valid)
    {
        sqlx::query_as("UPDATE listings SET state = 'ACTIVE', updated_at = now() WHERE id = $1 RETURNING *")
            .bind(listing_id)
            .fetch_one(&mut **tx)
            .await?
    } else {
        listing
    };

    Ok(ListingWithFiles { listing, files })
}

async fn reject(tx: &mut Transaction<'_, Postgres>, listing_id: Uuid) -> AppResult<ListingWithFiles> {
    let listing: ListingRow = sqlx::query_as("SELECT * FROM listings WHERE id = $1 FOR UPDATE")
        .bind(listing_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("listing not found"))?;

    let listing = if listing.state == ListingState::PendingValidation {
        sqlx::query_as("UPDATE listings SET state = 'REJECTED', updated_at = now() WHERE id = $1 RETURNING *")
            .bind(listing_id)
            .fetch_one(&mut **tx)
            .await?
    } else {
        listing
    };

    let files: Vec<ListingFileRow> = sqlx::query_as("SELECT * FROM listing_files WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_all(&mut **tx)
        .await?;

    Ok(ListingWithFiles { listing, files })
}
