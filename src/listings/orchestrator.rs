//! Listing orchestrator.
//! Mission: Tie the database, cache, event bus, and read assembler together
//! behind the create/get/list/update/delete operations (spec §4.2), plus the
//! file-completion fan-in that promotes a listing to `ACTIVE` or `REJECTED`
//! (resolved Open Question, SPEC_FULL.md §9).

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::db::listings::{self, ListingPatch, NewFile, NewListing};
use crate::db::models::{FileKind, ListingState, ListingWithFiles};
use crate::error::{AppError, AppResult};
use crate::events::{publish_json, subjects, EventBus};
use crate::listings::read_assembler::{self, ListingResponse};
use crate::listings::validate::{self, FileInput, ListingInput};
use crate::storage::S3Storage;

const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

fn cache_key(id: Uuid) -> String {
    format!("listing:{id}")
}

pub struct NewFileRequest {
    pub path: String,
    pub kind: FileKind,
    pub size_bytes: i64,
}

pub struct NewListingRequest {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub license: String,
    pub price_minor_units: i64,
    pub currency: Option<String>,
    pub is_free: bool,
    pub is_physical: bool,
    pub dimensions_mm: Option<(f64, f64, f64)>,
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
    pub files: Vec<NewFileRequest>,
}

#[derive(Default)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub price_minor_units: Option<i64>,
    pub currency: Option<Option<String>>,
    pub is_free: Option<bool>,
}

pub struct ListingOrchestrator {
    pool: sqlx::PgPool,
    cache: Cache,
    bus: Arc<dyn EventBus>,
    storage: Arc<S3Storage>,
}

impl ListingOrchestrator {
    pub fn new(pool: sqlx::PgPool, cache: Cache, bus: Arc<dyn EventBus>, storage: Arc<S3Storage>) -> Self {
        Self { pool, cache, bus, storage }
    }

    pub async fn create(
        &self,
        user_id: &str,
        seller_display_name: &str,
        seller_username: &str,
        seller_verified: bool,
        authorized_party: Option<String>,
        trace_id: String,
        req: NewListingRequest,
    ) -> AppResult<ListingResponse> {
        let file_inputs: Vec<FileInput> = req
            .files
            .iter()
            .map(|f| FileInput { path: f.path.clone(), kind: f.kind, size_bytes: f.size_bytes })
            .collect();

        validate::validate_listing(&ListingInput {
            title: &req.title,
            description: &req.description,
            categories: &req.categories,
            license: &req.license,
            price_minor_units: req.price_minor_units,
            currency: req.currency.as_deref(),
            dimensions_present: req.dimensions_mm.is_some(),
            dimensions: req.dimensions_mm,
            nozzle_temp_c: req.nozzle_temp_c,
            recommended_materials: &req.recommended_materials,
            hardware_items: &req.hardware_items,
            is_ai_generated: req.is_ai_generated,
            ai_model_name: req.ai_model_name.as_deref(),
            files: &file_inputs,
            user_id,
        })?;

        let thumbnail_path = req
            .files
            .first()
            .map(|f| f.path.clone())
            .ok_or_else(|| AppError::invalid_input("at least one file is required"))?;

        let dimensions_mm = req.dimensions_mm.map(|(x, y, z)| {
            serde_json::json!({ "width": x, "depth": y, "height": z })
        });

        let new_listing = NewListing {
            seller_id: user_id.to_string(),
            seller_display_name: seller_display_name.to_string(),
            seller_username: seller_username.to_string(),
            seller_verified,
            title: req.title,
            description: req.description,
            categories: req.categories,
            license: req.license,
            thumbnail_path,
            price_minor_units: req.price_minor_units,
            currency: req.currency,
            is_free: req.is_free,
            is_physical: req.is_physical,
            dimensions_mm,
            weight_grams: req.weight_grams,
            nozzle_temp_c: req.nozzle_temp_c,
            recommended_materials: req.recommended_materials,
            is_multicolor: req.is_multicolor,
            requires_assembly: req.requires_assembly,
            hardware_items: req.hardware_items,
            remixing_allowed: req.remixing_allowed,
            parent_listing_id: req.parent_listing_id,
            is_nsfw: req.is_nsfw,
            is_ai_generated: req.is_ai_generated,
            ai_model_name: req.ai_model_name,
            trace_id: trace_id.clone(),
            authorized_party,
            files: req
                .files
                .into_iter()
                .map(|f| NewFile { path: f.path, kind: f.kind, size_bytes: f.size_bytes, metadata: None })
                .collect(),
        };

        let created = listings::create_listing(&self.pool, new_listing).await?;

        for file in &created.files {
            let msg_id = subjects::start_validation_publish_id(user_id, created.listing.id, file.id);
            let event = subjects::StartFileValidation {
                user_id: user_id.to_string(),
                listing_id: created.listing.id,
                file_id: file.id,
                path: file.path.clone(),
                kind: file.kind,
            };
            let subject = subjects::validation_subject_for(file.kind);
            if let Err(err) = publish_json(self.bus.as_ref(), subject, &msg_id, &event).await {
                warn!(error = %err, file_id = %file.id, "failed to publish file validation event, relying on sweeper retry");
            }
        }

        Ok(read_assembler::assemble(&self.storage, &created))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ListingResponse> {
        if let Ok(Some(cached)) = self.cache.get_json::<ListingResponse>(&cache_key(id)).await {
            return Ok(cached);
        }

        let listing = listings::get_listing(&self.pool, id).await?;
        let response = read_assembler::assemble(&self.storage, &listing);

        let cache = self.cache.clone();
        let response_for_cache = response.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.set_json(&cache_key(id), &response_for_cache, CACHE_TTL).await {
                warn!(error = %err, listing_id = %id, "failed to populate listing cache");
            }
        });

        Ok(response)
    }

    pub async fn list_for_seller(&self, user_id: &str) -> AppResult<Vec<ListingResponse>> {
        let rows = listings::list_for_seller(&self.pool, user_id, None).await?;
        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            let files = listings::get_listing(&self.pool, row.id).await?.files;
            responses.push(read_assembler::assemble(&self.storage, &ListingWithFiles { listing: row, files }));
        }
        Ok(responses)
    }

    pub async fn update(&self, user_id: &str, id: Uuid, trace_id: String, req: UpdateListingRequest) -> AppResult<ListingResponse> {
        let existing = listings::get_listing(&self.pool, id).await?;
        if existing.listing.seller_id != user_id {
            return Err(AppError::unauthorized("listing does not belong to the requesting user"));
        }

        validate::validate_update(
            req.price_minor_units,
            req.currency.as_ref().map(|c| c.as_deref()),
            None,
            None,
        )?;

        let patch = ListingPatch {
            title: req.title,
            description: req.description,
            categories: req.categories,
            price_minor_units: req.price_minor_units,
            currency: req.currency,
            is_free: req.is_free,
            sale: None,
        };

        let updated = listings::update_listing(&self.pool, id, patch).await?;
        let _ = self.cache.delete(&cache_key(id)).await;

        let msg_id = subjects::index_listing_publish_id(id);
        let event = subjects::IndexListing { listing_id: id };
        if let Err(err) = publish_json(self.bus.as_ref(), subjects::INDEX_LISTING_SUBJECT, &msg_id, &event).await {
            warn!(error = %err, listing_id = %id, trace_id, "failed to publish re-index event");
        }

        let files = listings::get_listing(&self.pool, id).await?.files;
        Ok(read_assembler::assemble(&self.storage, &ListingWithFiles { listing: updated, files }))
    }

    pub async fn delete(&self, user_id: &str, id: Uuid) -> AppResult<()> {
        let existing = listings::get_listing(&self.pool, id).await?;
        if existing.listing.seller_id != user_id {
            // Not this caller's listing: a no-op per spec, not an error leak.
            return Ok(());
        }

        listings::soft_delete(&self.pool, id).await?;
        let _ = self.cache.delete(&cache_key(id)).await;
        Ok(())
    }

    /// Called by the (out-of-scope) file validation workers' completion
    /// callback when a file passes validation. Promotes the listing to
    /// `ACTIVE` and emits `IndexListing` when it was the last outstanding
    /// file.
    pub async fn on_file_valid(&self, file_id: Uuid) -> AppResult<ListingWithFiles> {
        let result = listings::mark_file_valid(&self.pool, file_id).await?;
        if result.listing.state == ListingState::Active {
            let msg_id = subjects::index_listing_publish_id(result.listing.id);
            let event = subjects::IndexListing { listing_id: result.listing.id };
            if let Err(err) = publish_json(self.bus.as_ref(), subjects::INDEX_LISTING_SUBJECT, &msg_id, &event).await {
                warn!(error = %err, listing_id = %result.listing.id, "failed to publish index event on promotion");
            } else {
                info!(listing_id = %result.listing.id, "listing promoted to ACTIVE");
            }
        }
        Ok(result)
    }

    pub async fn on_file_invalid(&self, file_id: Uuid, error_message: &str) -> AppResult<ListingWithFiles> {
        listings::mark_file_invalid(&self.pool, file_id, error_message).await
    }

    pub async fn on_file_failed(&self, file_id: Uuid, error_message: &str) -> AppResult<ListingWithFiles> {
        listings::mark_file_failed(&self.pool, file_id, error_message).await
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
