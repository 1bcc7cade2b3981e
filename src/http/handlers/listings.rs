//! Listing CRUD handlers.
//! Mission: Translate HTTP requests into [`ListingOrchestrator`] calls and
//! back into JSON responses (spec §4.2).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::models::FileKind;
use crate::error::AppResult;
use crate::listings::read_assembler::ListingResponse;
use crate::listings::{ListingOrchestrator, NewListingRequest, UpdateListingRequest};
use crate::middleware::current_request_id;
use crate::listings::orchestrator::NewFileRequest;

#[derive(Debug, Deserialize)]
pub struct FilePayload {
    pub path: String,
    pub kind: FileKind,
    pub size_bytes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub license: String,
    #[serde(default)]
    pub price_minor_units: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub is_physical: bool,
    #[serde(default)]
    pub dimensions_mm: Option<(f64, f64, f64)>,
    #[serde(default)]
    pub weight_grams: Option<f64>,
    #[serde(default)]
    pub nozzle_temp_c: Option<i32>,
    #[serde(default)]
    pub recommended_materials: Vec<String>,
    #[serde(default)]
    pub is_multicolor: bool,
    #[serde(default)]
    pub requires_assembly: bool,
    #[serde(default)]
    pub hardware_items: Vec<String>,
    #[serde(default)]
    pub remixing_allowed: bool,
    #[serde(default)]
    pub parent_listing_id: Option<Uuid>,
    #[serde(default)]
    pub is_nsfw: bool,
    #[serde(default)]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub ai_model_name: Option<String>,
    pub files: Vec<FilePayload>,
}

pub async fn create_listing(
    State(orchestrator): State<Arc<ListingOrchestrator>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateListingRequest>,
) -> AppResult<(StatusCode, Json<ListingResponse>)> {
    let request = NewListingRequest {
        title: req.title,
        description: req.description,
        categories: req.categories,
        license: req.license,
        price_minor_units: req.price_minor_units,
        currency: req.currency,
        is_free: req.is_free,
        is_physical: req.is_physical,
        dimensions_mm: req.dimensions_mm,
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
        files: req
            .files
            .into_iter()
            .map(|f| NewFileRequest { path: f.path, kind: f.kind, size_bytes: f.size_bytes })
            .collect(),
    };

    let response = orchestrator
        .create(
            &user.id,
            user.username.as_deref().unwrap_or(&user.id),
            user.username.as_deref().unwrap_or(&user.id),
            user.roles.iter().any(|r| r == "verified_seller"),
            user.azp.clone(),
            current_request_id(),
            request,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_listing(
    State(orchestrator): State<Arc<ListingOrchestrator>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ListingResponse>> {
    Ok(Json(orchestrator.get(id).await?))
}

pub async fn list_listings(
    State(orchestrator): State<Arc<ListingOrchestrator>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<ListingResponse>>> {
    Ok(Json(orchestrator.list_for_seller(&user.id).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateListingPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub price_minor_units: Option<i64>,
    #[serde(default)]
    pub currency: Option<Option<String>>,
    pub is_free: Option<bool>,
}

pub async fn update_listing(
    State(orchestrator): State<Arc<ListingOrchestrator>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateListingPayload>,
) -> AppResult<Json<ListingResponse>> {
    let request = UpdateListingRequest {
        title: req.title,
        description: req.description,
        categories: req.categories,
        price_minor_units: req.price_minor_units,
        currency: req.currency,
        is_free: req.is_free,
    };
    Ok(Json(orchestrator.update(&user.id, id, current_request_id(), request).await?))
}

pub async fn delete_listing(
    State(orchestrator): State<Arc<ListingOrchestrator>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    orchestrator.delete(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
