//! The debounce gate.
//!
//! Collapses bursts of broadcasts on the same stream into a single delivery
//! per window. The gate is lossy on purpose: only the signal that something
//! changed matters, not each individual change, so dropped payloads are not
//! an error. The check-then-write is best-effort; two near-simultaneous
//! calls may both deliver, which is acceptable for a throttle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::error::LivecastResult;
use crate::payload::Payload;
use crate::stream_name::{stream_name_from, StreamTarget};

/// Cache key namespace for debounce markers.
const KEY_PREFIX: &str = "livecast:debounce:";

/// Shared presence-marker store with expiry, e.g. Redis or an in-process
/// map. Multi-process deployments need a store shared by every process.
#[async_trait]
pub trait DebounceStore: Send + Sync {
    /// Write a marker under `key` with the given time-to-live, unless a
    /// live one already exists. Returns `true` when the marker was written
    /// (the gate is open), `false` when one was already live.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> LivecastResult<bool>;
}

/// Routes broadcasts through a presence-marker store so repeated broadcasts
/// on one stream within a window collapse into a single delivery.
pub struct Debouncer {
    store: Arc<dyn DebounceStore>,
    broadcaster: Arc<Broadcaster>,
    default_delay: Duration,
}

impl Debouncer {
    pub fn new(store: Arc<dyn DebounceStore>, broadcaster: Arc<Broadcaster>, config: &Config) -> Self {
        Self {
            store,
            broadcaster,
            default_delay: config.debounce_delay(),
        }
    }

    /// Dispatch `payload` unless the stream saw a broadcast within the last
    /// `delay` (falling back to the configured default window).
    ///
    /// A store failure fails open: losing a refresh signal is user-visible
    /// staleness, a duplicate one is just an extra reload.
    pub async fn broadcast_if_not_recent(
        &self,
        target: impl Into<StreamTarget>,
        payload: Payload,
        delay: Option<Duration>,
    ) {
        let stream_name = stream_name_from(target);
        let ttl = delay.unwrap_or(self.default_delay);
        let key = format!("{KEY_PREFIX}{stream_name}");

        match self.store.try_acquire(&key, ttl).await {
            Ok(true) => self.broadcaster.broadcast(stream_name, payload),
            Ok(false) => {
                debug!(stream = %stream_name, "broadcast debounced");
            }
            Err(error) => {
                warn!(stream = %stream_name, %error, "debounce store failed, delivering anyway");
                self.broadcaster.broadcast(stream_name, payload);
            }
        }
    }
}

/// In-process [`DebounceStore`] over a mutex-guarded map with lazy expiry.
/// Suitable for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryDebounceStore {
    markers: Mutex<HashMap<String, tokio::time::Instant>>,
}

impl MemoryDebounceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DebounceStore for MemoryDebounceStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> LivecastResult<bool> {
        let now = tokio::time::Instant::now();
        let mut markers = self.markers.lock().expect("debounce map poisoned");
        markers.retain(|_, expires_at| *expires_at > now);

        if markers.contains_key(key) {
            return Ok(false);
        }
        markers.insert(key.to_string(), now + ttl);
        Ok(true)
    }
}
