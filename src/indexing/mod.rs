//! Indexing worker.
//! Mission: Consume `IndexListing` events, compose the search document,
//! upsert it, and mark the listing indexed — classifying every failure mode
//! into ack (permanent/poison-pill) or nack (transient) per spec §4.5.

pub mod document;
pub mod search_client;

use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::listings;
use crate::events::{subjects, EventBus, Handler};
use crate::indexing::search_client::SearchClient;

#[derive(Debug, Deserialize)]
struct IndexListingPayload {
    #[serde(rename = "listingId")]
    listing_id: String,
}

pub struct IndexingWorker {
    pool: PgPool,
    bus: Arc<dyn EventBus>,
    search: SearchClient,
    public_base_url: String,
}

impl IndexingWorker {
    pub fn new(pool: PgPool, bus: Arc<dyn EventBus>, search: SearchClient, public_base_url: String) -> Self {
        Self { pool, bus, search, public_base_url }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let worker = self.clone();
        let handler: Handler = Arc::new(move |payload: Vec<u8>| {
            let worker = worker.clone();
            Box::pin(async move { worker.handle(payload).await })
        });

        self.bus
            .subscribe(subjects::INDEX_LISTING_SUBJECT, subjects::INDEXING_WORKER_GROUP, handler, shutdown)
            .await
    }

    /// Returns `Ok(())` to ack (including every "log & ack" classification
    /// in spec §4.5's table) and `Err` to nack.
    async fn handle(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        let parsed: IndexListingPayload = match serde_json::from_slice(&payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "index event payload is not valid JSON, acking as poison pill");
                return Ok(());
            }
        };

        let listing_id: Uuid = match parsed.listing_id.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(listing_id = %parsed.listing_id, "index event listingId is not a well-formed UUID, acking");
                return Ok(());
            }
        };

        let listing = match listings::get_listing(&self.pool, listing_id).await {
            Ok(listing) => listing,
            Err(err) if is_not_found(&err) => {
                info!(%listing_id, "listing not found, likely deleted, acking");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, %listing_id, "transient db error reading listing, nacking");
                return Err(err.into());
            }
        };

        if listing.listing.thumbnail_path.is_empty() {
            warn!(%listing_id, "listing has no thumbnail path, acking as incomplete");
            return Ok(());
        }

        let document = document::compose(&listing.listing, &self.public_base_url);
        if let Err(err) = self.search.upsert_document(&document).await {
            warn!(error = %err, %listing_id, "search upsert failed, nacking");
            return Err(err);
        }

        if let Err(err) = listings::mark_indexed(&self.pool, listing_id).await {
            warn!(error = %err, %listing_id, "failed to mark listing indexed, nacking");
            return Err(err.into());
        }

        info!(%listing_id, "listing indexed");
        Ok(())
    }
}

fn is_not_found(err: &crate::error::AppError) -> bool {
    err.code() == crate::error::ErrorCode::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_rejected_before_parsing_uuid() {
        let result: Result<IndexListingPayload, _> = serde_json::from_slice(b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_uuid_fails_to_parse() {
        let payload = IndexListingPayload { listing_id: "not-a-uuid".to_string() };
        assert!(payload.listing_id.parse::<Uuid>().is_err());
    }
}
