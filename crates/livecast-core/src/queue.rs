//! Out-of-band broadcast delivery.
//!
//! The binder hands resolved `(stream_name, payload)` pairs to a queue and
//! returns immediately. Delivery failures are the queue's problem, not the
//! commit path's.

use std::sync::Arc;

use crate::broadcaster::Broadcaster;
use crate::payload::Payload;

/// Fire-and-forget hand-off of an already-resolved broadcast.
pub trait BroadcastQueue: Send + Sync {
    fn enqueue(&self, stream_name: String, payload: Payload);
}

/// Delivers each enqueued broadcast on a spawned tokio task.
pub struct SpawnQueue {
    broadcaster: Arc<Broadcaster>,
}

impl SpawnQueue {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

impl BroadcastQueue for SpawnQueue {
    fn enqueue(&self, stream_name: String, payload: Payload) {
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            broadcaster.broadcast(stream_name, payload);
        });
    }
}

/// Delivers enqueued broadcasts inline on the calling thread. Used in tests
/// so asynchronous broadcasts are observable deterministically.
pub struct InlineQueue {
    broadcaster: Arc<Broadcaster>,
}

impl InlineQueue {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

impl BroadcastQueue for InlineQueue {
    fn enqueue(&self, stream_name: String, payload: Payload) {
        self.broadcaster.broadcast(stream_name, payload);
    }
}
