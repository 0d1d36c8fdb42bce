//! Redis-backed debounce store.
//!
//! Markers live under the debouncer's key namespace with a millisecond TTL.
//! `SET NX PX` makes the acquire atomic, so concurrent processes sharing
//! one Redis agree on which broadcast opened the window.

use std::time::Duration;

use async_trait::async_trait;
use livecast_core::{DebounceStore, LivecastError, LivecastResult};
use redis::SetOptions;
use tracing::debug;

use crate::client::RedisPool;

/// [`DebounceStore`] over a shared Redis, for multi-process deployments.
pub struct RedisDebounceStore {
    pool: RedisPool,
}

impl RedisDebounceStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DebounceStore for RedisDebounceStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> LivecastResult<bool> {
        let mut conn = self.pool.clone();
        let options = SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::PX(ttl.as_millis() as u64));

        let reply: redis::Value = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg(&options)
            .query_async(&mut conn)
            .await
            .map_err(|e| LivecastError::store(e.to_string()))?;

        // SET NX replies nil when the marker already existed.
        let acquired = !matches!(reply, redis::Value::Nil);
        debug!(key, acquired, "debounce marker");
        Ok(acquired)
    }
}
