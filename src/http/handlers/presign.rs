//! Upload-authorization handler.
//! Mission: Wire `POST /files/presign` to the [`UploadAuthorizer`] (spec §4.1).

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::models::FileKind;
use crate::error::AppResult;
use crate::upload::{UploadAuthorizer, UploadRequest, UploadResponse};

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub kind: FileKind,
    pub filename: String,
    pub content_type: Option<String>,
    pub draft_id: String,
}

pub async fn presign_upload(
    State(authorizer): State<Arc<UploadAuthorizer>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PresignRequest>,
) -> AppResult<Json<UploadResponse>> {
    let grant = authorizer.authorize(UploadRequest {
        user_id: user.id,
        kind: req.kind,
        filename: req.filename,
        content_type: req.content_type,
        draft_id: req.draft_id,
    })?;
    Ok(Json(grant))
}
