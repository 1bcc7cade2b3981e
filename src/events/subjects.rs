//! Event subjects and payloads.
//! Mission: Name the subjects and shapes carried over the bus (spec §4.2,
//! §4.5, §6).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::FileKind;

pub const IMAGE_VALIDATION_SUBJECT: &str = "files.validate.image";
pub const MODEL_VALIDATION_SUBJECT: &str = "files.validate.model";
pub const FILE_VALIDATION_RESULT_SUBJECT: &str = "files.validate.result";
pub const INDEX_LISTING_SUBJECT: &str = "listings.index";

pub const INDEXING_WORKER_GROUP: &str = "listings-worker";
pub const VALIDATION_RESULT_GROUP: &str = "listings-core";

pub fn validation_subject_for(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => IMAGE_VALIDATION_SUBJECT,
        FileKind::Model => MODEL_VALIDATION_SUBJECT,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFileValidation {
    pub user_id: String,
    pub listing_id: Uuid,
    pub file_id: Uuid,
    pub path: String,
    pub kind: FileKind,
}

/// `start.{userId}.{listingId}.{fileId}` — dedupes retried publishes on the
/// bus (spec §4.2).
pub fn start_validation_publish_id(user_id: &str, listing_id: Uuid, file_id: Uuid) -> String {
    format!("start.{user_id}.{listing_id}.{file_id}")
}

/// The validation workers' completion signal (spec §1: "the core publishes
/// their inputs and consumes their completion signal"). Carried on a single
/// subject regardless of file kind; `status` drives the fan-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileValidationStatus {
    Valid,
    Invalid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationCompleted {
    pub file_id: Uuid,
    pub status: FileValidationStatus,
    pub error_message: Option<String>,
}

pub fn validation_result_publish_id(file_id: Uuid, status: FileValidationStatus) -> String {
    format!("result.{file_id}.{status:?}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexListing {
    pub listing_id: Uuid,
}

pub fn index_listing_publish_id(listing_id: Uuid) -> String {
    format!("index.{listing_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_subject_routes_by_kind() {
        assert_eq!(validation_subject_for(FileKind::Image), IMAGE_VALIDATION_SUBJECT);
        assert_eq!(validation_subject_for(FileKind::Model), MODEL_VALIDATION_SUBJECT);
    }

    #[test]
    fn publish_ids_are_stable_for_the_same_inputs() {
        let listing_id = Uuid::nil();
        let file_id = Uuid::nil();
        assert_eq!(
            start_validation_publish_id("u1", listing_id, file_id),
            start_validation_publish_id("u1", listing_id, file_id)
        );
    }
}
