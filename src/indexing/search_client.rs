//! Search index client.
//! Mission: Upsert composed documents into the search index (spec §4.5).
//! HTTP client pattern grounded in the teacher's scraper clients — a thin
//! `reqwest::Client` wrapper with one method per remote operation.

use anyhow::{Context, Result};
use serde::Serialize;

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    collection: String,
}

impl SearchClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, collection: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key: api_key.to_string(), collection: collection.to_string() }
    }

    /// Upsert a document by id — transient failures (network errors, 5xx)
    /// are returned as errors so the caller can nack; non-transient failures
    /// never happen here since the document shape is controlled internally.
    pub async fn upsert_document<T: Serialize>(&self, document: &T) -> Result<()> {
        let url = format!("{}/collections/{}/documents?action=upsert", self.base_url, self.collection);
        let response = self
            .http
            .post(&url)
            .header("X-TYPESENSE-API-KEY", &self.api_key)
            .json(document)
            .send()
            .await
            .context("search upsert request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("search upsert returned {status}: {body}");
        }
        Ok(())
    }
}
