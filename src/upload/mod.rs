//! Upload authorizer.
//! Mission: Issue a bounded, pre-signed grant for a single upload so the
//! gateway never receives file bytes (spec §4.1).

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::FileKind;
use crate::error::{AppError, AppResult};
use crate::storage::{presign_post::hash_filename, PostPolicy, StorageAdapter, UploadGrant};

/// Static per-kind upload limits (spec §4.1: "image defaults to 5 MiB ...,
/// model defaults to 50 MiB with STL/3MF/octet-stream").
struct KindConfig {
    max_bytes: u64,
    allowed_mime_types: &'static [&'static str],
    key_prefix: &'static str,
}

const IMAGE_CONFIG: KindConfig = KindConfig {
    max_bytes: 5 * 1024 * 1024,
    allowed_mime_types: &["image/jpeg", "image/png", "image/gif"],
    key_prefix: "images",
};

const MODEL_CONFIG: KindConfig = KindConfig {
    max_bytes: 50 * 1024 * 1024,
    allowed_mime_types: &["model/stl", "model/3mf", "application/octet-stream"],
    key_prefix: "models",
};

const MIN_UPLOAD_BYTES: u64 = 1024;
const GRANT_EXPIRY_HOURS: i64 = 1;

fn config_for(kind: FileKind) -> &'static KindConfig {
    match kind {
        FileKind::Image => &IMAGE_CONFIG,
        FileKind::Model => &MODEL_CONFIG,
    }
}

/// Infer a content type from the filename's extension when the client omits
/// `Content-Type` (spec §4.1).
fn infer_content_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "stl" => Some("model/stl"),
        "3mf" => Some("model/3mf"),
        "obj" => Some("application/octet-stream"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub struct UploadRequest {
    pub user_id: String,
    pub kind: FileKind,
    pub filename: String,
    pub content_type: Option<String>,
    pub draft_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_url: String,
    pub form_fields: Vec<(String, String)>,
    pub key: String,
}

pub struct UploadAuthorizer {
    storage: Arc<dyn StorageAdapter>,
}

impl UploadAuthorizer {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    pub fn authorize(&self, req: UploadRequest) -> AppResult<UploadResponse> {
        let config = config_for(req.kind);

        let content_type = req
            .content_type
            .filter(|ct| !ct.is_empty())
            .or_else(|| infer_content_type(&req.filename).map(str::to_string))
            .ok_or_else(|| AppError::invalid_input("unable to determine content type for upload"))?;

        if !config.allowed_mime_types.contains(&content_type.as_str()) {
            return Err(AppError::invalid_input(format!(
                "content type {content_type} is not allowed for kind {:?}",
                req.kind
            )));
        }

        let key = build_key(&req.user_id, &req.draft_id, config.key_prefix, &req.filename);

        let grant: UploadGrant = self
            .storage
            .build_upload_grant(PostPolicy {
                key: key.clone(),
                content_type,
                min_size_bytes: MIN_UPLOAD_BYTES,
                max_size_bytes: config.max_bytes,
                expiry: Duration::hours(GRANT_EXPIRY_HOURS),
            })
            .map_err(AppError::from)?;

        Ok(UploadResponse { upload_url: grant.upload_url, form_fields: grant.form_fields, key: grant.key })
    }
}

/// `YYYY/MM/DD/{userId}/{draftId}/{kindPrefix}/{sha256(filename)}{ext}`,
/// UTC and zero-padded. Bit-exact: this path is re-parsed later for
/// ownership checks (spec §4.1, §4.2).
fn build_key(user_id: &str, draft_id: &str, kind_prefix: &str, filename: &str) -> String {
    let now = Utc::now();
    let ext = filename.rsplit_once('.').map(|(_, ext)| format!(".{ext}")).unwrap_or_default();
    format!(
        "{:04}/{:02}/{:02}/{user_id}/{draft_id}/{kind_prefix}/{}{ext}",
        now.format("%Y"),
        now.format("%m"),
        now.format("%d"),
        hash_filename(filename),
    )
}

/// Verify that path segment 4 (`YYYY/MM/DD/userId/...`, 0-indexed) matches
/// the calling user — the ownership check every file in a listing must pass
/// (spec §4.2).
pub fn path_belongs_to_user(path: &str, user_id: &str) -> bool {
    path.split('/').nth(3) == Some(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_content_type_from_extension() {
        assert_eq!(infer_content_type("dragon.stl"), Some("model/stl"));
        assert_eq!(infer_content_type("photo.PNG"), Some("image/png"));
        assert_eq!(infer_content_type("unknown.xyz"), None);
    }

    #[test]
    fn build_key_places_user_id_in_fourth_segment() {
        let key = build_key("user-42", "draft-1", "models", "dragon.stl");
        let segments: Vec<&str> = key.split('/').collect();
        assert_eq!(segments[3], "user-42");
        assert_eq!(segments[4], "draft-1");
        assert_eq!(segments[5], "models");
        assert!(key.ends_with(".stl"));
    }

    #[test]
    fn path_ownership_check_matches_fourth_segment() {
        let path = "2026/07/28/user-42/draft-1/models/abc123.stl";
        assert!(path_belongs_to_user(path, "user-42"));
        assert!(!path_belongs_to_user(path, "someone-else"));
    }

    #[test]
    fn rejects_disallowed_mime_type_for_kind() {
        let authorizer = UploadAuthorizer::new(Arc::new(crate::storage::tests_support::NullStorage));
        let result = authorizer.authorize(UploadRequest {
            user_id: "user-1".to_string(),
            kind: FileKind::Image,
            filename: "malware.exe".to_string(),
            content_type: Some("application/x-msdownload".to_string()),
            draft_id: "draft-1".to_string(),
        });
        assert!(result.is_err());
    }
}
