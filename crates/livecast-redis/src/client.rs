//! Connection handling for the shared debounce cache.
//!
//! One `ConnectionManager` serves the whole process; it multiplexes and
//! reconnects internally, and cloning it is how each store operation gets a
//! mutable handle.

use redis::aio::ConnectionManager;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedisError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),
}

pub type RedisResult<T> = Result<T, RedisError>;

/// Shared handle the debounce store clones per acquire.
pub type RedisPool = ConnectionManager;

/// Connect to the Redis behind the debounce gate.
///
/// Example URL: `redis://127.0.0.1:6379`
pub async fn init_pool(redis_url: &str) -> RedisResult<RedisPool> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}
