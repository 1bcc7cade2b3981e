//! File-validation completion consumer.
//! Mission: Consume the validation workers' completion signal and drive the
//! `PENDING_VALIDATION -> ACTIVE | REJECTED` fan-in (spec §1, DESIGN.md's
//! resolved Open Question).

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::events::subjects::{self, FileValidationStatus};
use crate::events::{EventBus, Handler};
use crate::listings::ListingOrchestrator;

#[derive(Debug, Deserialize)]
struct FileValidationCompletedPayload {
    #[serde(rename = "fileId")]
    file_id: String,
    status: FileValidationStatus,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

pub struct FileValidationCompletionConsumer {
    orchestrator: Arc<ListingOrchestrator>,
    bus: Arc<dyn EventBus>,
}

impl FileValidationCompletionConsumer {
    pub fn new(orchestrator: Arc<ListingOrchestrator>, bus: Arc<dyn EventBus>) -> Self {
        Self { orchestrator, bus }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let consumer = self.clone();
        let handler: Handler = Arc::new(move |payload: Vec<u8>| {
            let consumer = consumer.clone();
            Box::pin(async move { consumer.handle(payload).await })
        });

        self.bus
            .subscribe(
                subjects::FILE_VALIDATION_RESULT_SUBJECT,
                subjects::VALIDATION_RESULT_GROUP,
                handler,
                shutdown,
            )
            .await
    }

    /// Returns `Ok(())` to ack (including poison-pill and ghost-file cases)
    /// and `Err` to nack on a transient failure.
    async fn handle(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        let parsed: FileValidationCompletedPayload = match serde_json::from_slice(&payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "validation completion payload is not valid JSON, acking as poison pill");
                return Ok(());
            }
        };

        let file_id: Uuid = match parsed.file_id.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(file_id = %parsed.file_id, "validation completion fileId is not a well-formed UUID, acking");
                return Ok(());
            }
        };

        let result = match parsed.status {
            FileValidationStatus::Valid => self.orchestrator.on_file_valid(file_id).await,
            FileValidationStatus::Invalid => {
                self.orchestrator
                    .on_file_invalid(file_id, parsed.error_message.as_deref().unwrap_or("invalid"))
                    .await
            }
            FileValidationStatus::Failed => {
                self.orchestrator
                    .on_file_failed(file_id, parsed.error_message.as_deref().unwrap_or("validation failed"))
                    .await
            }
        };

        match result {
            Ok(listing) => {
                info!(%file_id, listing_id = %listing.listing.id, state = ?listing.listing.state, "file validation result applied");
                Ok(())
            }
            Err(err) if err.code() == ErrorCode::NotFound => {
                info!(%file_id, "file not found, likely deleted, acking");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, %file_id, "transient error applying validation result, nacking");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_rejected_before_parsing_uuid() {
        let result: Result<FileValidationCompletedPayload, _> = serde_json::from_slice(b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_file_id_fails_to_parse() {
        let payload = FileValidationCompletedPayload {
            file_id: "not-a-uuid".to_string(),
            status: FileValidationStatus::Valid,
            error_message: None,
        };
        assert!(payload.file_id.parse::<Uuid>().is_err());
    }

    #[test]
    fn status_round_trips_through_json() {
        let json = serde_json::json!({"fileId": Uuid::nil().to_string(), "status": "INVALID", "errorMessage": "bad mesh"});
        let parsed: FileValidationCompletedPayload = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.status, FileValidationStatus::Invalid);
    }
}
