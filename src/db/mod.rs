//! Relational persistence.
//! Mission: Own the listing lifecycle's durable state (spec §3, §4).

pub mod listings;
pub mod models;

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Connect to Postgres and run pending migrations.
///
/// Migrations are embedded at compile time via [`sqlx::migrate!`], the same
/// way the teacher embedded its schema-init SQL, so a fresh deploy never
/// depends on a separate migration step.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;

    sqlx::migrate!("./migrations").run(&pool).await.context("failed to run migrations")?;

    info!(max_connections, "database pool ready");
    Ok(pool)
}
