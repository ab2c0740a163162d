//! Redis implementation of [`RemoteStore`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::RemoteStore;
use crate::error::{CacheError, Result};

/// Redis-backed store. The connection manager reconnects on its own and
/// is cheap to clone per command.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` and verifies the server answers.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(redis_error)?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(redis_error)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        info!(url = %url, "Connected to Redis");

        Ok(Self { conn })
    }

    /// Wraps an existing connection manager.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(redis_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, value).await.map_err(redis_error)
        } else {
            conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl))
                .await
                .map_err(redis_error)
        }
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }

        // Nil reply means the key already existed
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(redis_error)?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(redis_error)
    }
}

/// Longest expiry sent to Redis. Redis adds the current time to it as a
/// signed 64-bit value, so larger values are rejected as invalid.
const MAX_TTL_MILLIS: u64 = (i64::MAX / 2) as u64;

/// Whole milliseconds, at least one so a tiny TTL still expires.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_TTL_MILLIS)
}

fn redis_error(e: redis::RedisError) -> CacheError {
    CacheError::Remote(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_up_to_one() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_ttl_millis_caps_huge_ttls() {
        assert_eq!(ttl_millis(Duration::from_secs(u64::MAX)), MAX_TTL_MILLIS);
        assert_eq!(ttl_millis(Duration::MAX), MAX_TTL_MILLIS);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(CacheError::Remote(_))));
    }
}
