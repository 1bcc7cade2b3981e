//! Key-value cache.
//! Mission: Back the idempotency lock/replay algorithm and cache hot listing
//! reads (spec §4.3, §4.6), via a single multiplexed connection the way the
//! teacher kept one pooled handle per external dependency.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::timeouts::CACHE_POOL_WAIT;

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        let config = redis::aio::ConnectionManagerConfig::new()
            .set_connection_timeout(CACHE_POOL_WAIT)
            .set_response_timeout(CACHE_POOL_WAIT);
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    pub async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await.context("redis SETEX failed")?;
        Ok(())
    }

    /// Atomically set `key` to `value` only if absent, returning whether the
    /// set happened. Used for the idempotency lock (first writer wins).
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .context("redis SET NX failed")?
            .is_some();
        Ok(acquired)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.context("redis DEL failed")?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_string(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).context("cached value is not valid JSON")?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value).context("failed to serialize cache value")?;
        self.set_string(key, &raw, ttl).await
    }
}
