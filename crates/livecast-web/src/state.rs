//! Shared cable state: per-stream fan-out channels.

use std::collections::HashMap;
use std::sync::Mutex;

use livecast_core::{Payload, StreamVerifier, Transport};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of each per-stream channel. Slow subscribers that lag further
/// than this lose the oldest payloads, which for refresh signals is harmless.
const CHANNEL_CAPACITY: usize = 100;

/// One fan-out channel per active stream, created lazily on first subscribe
/// and dropped once the last subscriber is gone.
///
/// Implements [`Transport`]: a broadcast on a stream reaches every socket
/// currently subscribed to it, and nothing else.
pub struct CableState {
    verifier: StreamVerifier,
    streams: Mutex<HashMap<String, broadcast::Sender<Payload>>>,
}

impl CableState {
    pub fn new(verifier: StreamVerifier) -> Self {
        Self {
            verifier,
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub fn verifier(&self) -> &StreamVerifier {
        &self.verifier
    }

    /// Subscribe to a stream, creating its channel if needed.
    pub fn subscribe(&self, stream_name: &str) -> broadcast::Receiver<Payload> {
        let mut streams = self.streams.lock().expect("stream map poisoned");
        streams
            .entry(stream_name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of sockets currently subscribed to a stream.
    pub fn subscriber_count(&self, stream_name: &str) -> usize {
        let streams = self.streams.lock().expect("stream map poisoned");
        streams
            .get(stream_name)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Transport for CableState {
    fn broadcast(&self, stream_name: &str, payload: Payload) {
        let mut streams = self.streams.lock().expect("stream map poisoned");
        if let Some(tx) = streams.get(stream_name) {
            if tx.send(payload).is_err() {
                // Last subscriber left; drop the channel.
                streams.remove(stream_name);
                debug!(stream = %stream_name, "dropped idle stream channel");
            }
        } else {
            debug!(stream = %stream_name, "broadcast to stream with no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecast_core::Action;

    fn state() -> CableState {
        CableState::new(StreamVerifier::new("test-secret"))
    }

    fn refresh() -> Payload {
        Payload::refresh("Post", Some(1), Action::Update, None)
    }

    #[tokio::test]
    async fn broadcast_reaches_all_stream_subscribers() {
        let state = state();
        let mut a = state.subscribe("posts");
        let mut b = state.subscribe("posts");

        let sent = refresh();
        state.broadcast("posts", sent.clone());

        assert_eq!(a.recv().await.unwrap(), sent);
        assert_eq!(b.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn broadcast_does_not_cross_streams() {
        let state = state();
        let mut posts = state.subscribe("posts");
        let _comments = state.subscribe("comments");

        state.broadcast("comments", refresh());

        assert!(matches!(
            posts.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_a_noop() {
        let state = state();
        state.broadcast("nobody-home", refresh());
        assert_eq!(state.subscriber_count("nobody-home"), 0);
    }

    #[tokio::test]
    async fn idle_channels_are_reaped_on_next_broadcast() {
        let state = state();
        drop(state.subscribe("posts"));
        state.broadcast("posts", refresh());
        state.broadcast("posts", refresh());
        assert_eq!(state.subscriber_count("posts"), 0);
    }
}
