//! Runtime configuration.
//! Mission: Load every environment variable the gateway and indexer recognize.

use std::env;
use std::time::Duration;

/// Gateway + indexer configuration, loaded once at process startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_dsn: String,
    pub db_max_connections: u32,

    pub nats_endpoint: String,

    pub redis_addr: String,
    pub redis_password: Option<String>,
    pub redis_pool_size: usize,
    pub redis_min_idle_conns: usize,

    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_use_ssl: bool,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_incoming_bucket: String,
    pub s3_private_bucket: String,

    pub authorization_url: String,
    pub authorization_realm: String,
    pub authorization_client_id: String,

    pub public_files_url: String,
    pub domain_name: String,
    pub api_port: u16,

    pub typesense_url: String,
    pub typesense_api_key: String,
    pub typesense_collection: String,

    pub event_stream_name: String,

    pub index_worker_port: u16,
}

impl Config {
    /// Load configuration from the process environment (`.env` first, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let db_dsn = require_env("DB_DSN")?;
        let db_max_connections = parse_env("DB_MAX_CONNECTIONS", 10);
        let nats_endpoint = env::var("NATS_ENDPOINT").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());

        let redis_addr = env::var("REDIS_ADDR").unwrap_or_else(|_| "127.0.0.1:6379".to_string());
        let redis_password = env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty());
        let redis_pool_size = parse_env("REDIS_POOL_SIZE", 10);
        let redis_min_idle_conns = parse_env("REDIS_MIN_IDLE_CONNS", 1);

        let s3_endpoint = env::var("S3_ENDPOINT").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_use_ssl = env::var("S3_USE_SSL")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(true);
        let s3_access_key = require_env("S3_ACCESS_KEY")?;
        let s3_secret_key = require_env("S3_SECRET_KEY")?;
        let s3_incoming_bucket = env::var("S3_INCOMING_BUCKET").unwrap_or_else(|_| "incoming-files".to_string());
        let s3_private_bucket = env::var("S3_PRIVATE_BUCKET").unwrap_or_else(|_| "private-files".to_string());

        let authorization_url = require_env("AUTHORIZATION_URL")?;
        let authorization_realm = require_env("AUTHORIZATION_REALM")?;
        let authorization_client_id = require_env("AUTHORIZATION_CLIENT_ID")?;

        let public_files_url = require_env("PUBLIC_FILES_URL")?;
        let domain_name = env::var("DOMAIN_NAME").unwrap_or_else(|_| "localhost".to_string());
        let api_port = parse_env("API_PORT", 8080);

        let typesense_url = require_env("TYPESENSE_URL")?;
        let typesense_api_key = require_env("TYPESENSE_API_KEY")?;
        let typesense_collection = env::var("TYPESENSE_COLLECTION").unwrap_or_else(|_| "listings".to_string());

        let event_stream_name = env::var("EVENT_STREAM_NAME").unwrap_or_else(|_| "listings-events".to_string());

        let index_worker_port = parse_env("INDEX_WORKER_PORT", 8081);

        Ok(Self {
            db_dsn,
            db_max_connections,
            nats_endpoint,
            redis_addr,
            redis_password,
            redis_pool_size,
            redis_min_idle_conns,
            s3_endpoint,
            s3_region,
            s3_use_ssl,
            s3_access_key,
            s3_secret_key,
            s3_incoming_bucket,
            s3_private_bucket,
            authorization_url,
            authorization_realm,
            authorization_client_id,
            public_files_url,
            domain_name,
            api_port,
            typesense_url,
            typesense_api_key,
            typesense_collection,
            event_stream_name,
            index_worker_port,
        })
    }

    /// JWKS endpoint for the configured OIDC realm (Keycloak-shaped issuer layout).
    pub fn jwks_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/certs",
            self.authorization_url.trim_end_matches('/'),
            self.authorization_realm
        )
    }

    /// Issuer string expected in verified tokens' `iss` claim.
    pub fn issuer(&self) -> String {
        format!(
            "{}/realms/{}",
            self.authorization_url.trim_end_matches('/'),
            self.authorization_realm
        )
    }

    /// `redis://[:password@]host:port` connection string for `redis::Client`.
    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(password) => format!("redis://:{password}@{}", self.redis_addr),
            None => format!("redis://{}", self.redis_addr),
        }
    }
}

fn require_env(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("missing required environment variable {key}"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Shared timeout budgets referenced throughout the gateway and indexer.
pub mod timeouts {
    use super::Duration;

    pub const HTTP_OVERALL: Duration = Duration::from_secs(60);
    pub const BUS_MESSAGE_DEADLINE: Duration = Duration::from_secs(30);
    pub const BUS_RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
    pub const CACHE_POOL_WAIT: Duration = Duration::from_secs(4);
    pub const IDEMPOTENCY_LOCK_TTL: Duration = Duration::from_secs(10);
    pub const IDEMPOTENCY_DATA_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
    pub const LISTING_CACHE_TTL: Duration = Duration::from_secs(3600);
    pub const SIGNED_MODEL_URL_TTL: Duration = Duration::from_secs(15 * 60);
    pub const BUS_MAX_IN_FLIGHT: usize = 10;
}
