//! Search indexing worker.
//! Mission: Consume `listings.index` events, upsert the search document, and
//! mark listings indexed, exposing only a liveness port (spec §4.5).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use clap::Parser;
use dotenv::dotenv;
use listings_backend::config::Config;
use listings_backend::db;
use listings_backend::events::{subjects, EventBus, NatsEventBus};
use listings_backend::indexing::{search_client::SearchClient, IndexingWorker};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line overrides for the search indexing worker.
#[derive(Debug, Parser)]
#[command(name = "listings-indexer")]
struct Cli {
    /// Liveness port override; defaults to `INDEX_WORKER_PORT`.
    #[arg(long, env = "INDEX_WORKER_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let port = cli.port.unwrap_or(config.index_worker_port);

    info!("search indexing worker starting");

    let pool = db::connect(&config.db_dsn, config.db_max_connections)
        .await
        .context("failed to connect to database")?;

    let bus: Arc<dyn EventBus> = Arc::new(
        NatsEventBus::connect(
            &config.nats_endpoint,
            &config.event_stream_name,
            &[
                subjects::IMAGE_VALIDATION_SUBJECT,
                subjects::MODEL_VALIDATION_SUBJECT,
                subjects::FILE_VALIDATION_RESULT_SUBJECT,
                subjects::INDEX_LISTING_SUBJECT,
            ],
        )
        .await
        .context("failed to connect to event bus")?,
    );

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;
    let search = SearchClient::new(http_client, &config.typesense_url, &config.typesense_api_key, &config.typesense_collection);

    let worker = Arc::new(IndexingWorker::new(pool, bus, search, config.public_files_url.clone()));

    let shutdown = CancellationToken::new();
    let worker_shutdown = shutdown.clone();
    let worker_task = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let health_app = Router::new().route("/health", get(health));
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await.context("failed to bind liveness listener")?;
    info!(addr, "indexing worker liveness endpoint listening");

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, health_app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining indexing worker");
    shutdown.cancel();

    worker_task.await.context("indexing worker task panicked")??;
    server_task
        .await
        .context("liveness server task panicked")?
        .context("liveness server failed")?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listings_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    let _ = dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}
