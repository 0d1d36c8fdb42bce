//! Livecast Redis
//!
//! Redis backing for the debounce gate, shared across processes.

pub mod client;
pub mod debounce;

pub use client::{init_pool, RedisError, RedisPool, RedisResult};
pub use debounce::RedisDebounceStore;
