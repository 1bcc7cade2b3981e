//! Listings gateway.
//! Mission: Serve the marketplace listing API — create/read/update/delete,
//! upload authorization, and the file-completion callbacks that drive a
//! listing to `ACTIVE` (spec §4, §6).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use listings_backend::auth::OidcVerifier;
use listings_backend::cache::Cache;
use listings_backend::config::Config;
use listings_backend::db;
use listings_backend::events::{subjects, EventBus, NatsEventBus};
use listings_backend::http::routes::{build_router, AppState};
use listings_backend::listings::{FileValidationCompletionConsumer, ListingOrchestrator};
use listings_backend::storage::S3Storage;
use listings_backend::upload::UploadAuthorizer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("listings gateway starting");

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = db::connect(&config.db_dsn, config.db_max_connections)
        .await
        .context("failed to connect to database")?;

    let cache = Cache::connect(&config.redis_url()).await.context("failed to connect to redis")?;

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

    let storage = Arc::new(
        S3Storage::new(
            &config.s3_endpoint,
            &config.s3_region,
            &config.s3_access_key,
            &config.s3_secret_key,
            &config.s3_incoming_bucket,
            &config.s3_private_bucket,
            &config.public_files_url,
        )
        .context("failed to build storage client")?,
    );

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    let verifier = OidcVerifier::new(
        http_client,
        config.jwks_url(),
        config.issuer(),
        config.authorization_client_id.clone(),
    );

    let orchestrator = Arc::new(ListingOrchestrator::new(pool, cache.clone(), bus.clone(), storage.clone()));
    let upload_authorizer = Arc::new(UploadAuthorizer::new(storage));

    let state = AppState {
        orchestrator: orchestrator.clone(),
        upload_authorizer,
        verifier,
        cache,
        cors_origin: config.domain_name.clone(),
    };

    let app = build_router(state);

    let shutdown = CancellationToken::new();
    let consumer = Arc::new(FileValidationCompletionConsumer::new(orchestrator, bus));
    let consumer_shutdown = shutdown.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(consumer_shutdown).await });

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = TcpListener::bind(&addr).await.context("failed to bind listener")?;
    info!(addr, "listings gateway listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal(server_shutdown).await })
        .await
        .context("server error")?;

    shutdown.cancel();
    consumer_task.await.context("file validation completion consumer task panicked")??;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    shutdown.cancel();
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listings_backend=info,tower_http=info".into()),
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
