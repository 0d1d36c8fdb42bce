//! The consumer seam: where subscriptions meet a transport connection.
//!
//! A [`Consumer`] multiplexes many stream subscriptions over one underlying
//! connection. The runtime accepts any implementation — a shared in-process
//! one, or an injected external connection adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use livecast_core::{Payload, StreamVerifier, Transport};
use tokio::sync::{broadcast, mpsc};

/// Events delivered to one subscription.
#[derive(Clone, Debug)]
pub enum SubscriptionEvent {
    Connected,
    Disconnected,
    Rejected,
    Received(Payload),
}

/// A live registration with a consumer. Dropping the handle unsubscribes:
/// the consumer notices the closed channel and stops forwarding.
pub struct SubscriptionHandle {
    pub events: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

/// Multiplexes stream subscriptions over a shared connection.
pub trait Consumer: Send + Sync {
    /// Open a subscription keyed by a signed stream token. Acceptance or
    /// rejection arrives as the first event on the handle.
    fn subscribe(&self, signed_stream_name: &str) -> SubscriptionHandle;
}

/// In-process consumer for tests and single-process apps: verifies tokens
/// locally and fans payloads out over per-stream channels.
///
/// The server side of the loopback is the [`Transport`] impl, so a core
/// `Broadcaster` can deliver straight into subscribed clients.
pub struct ChannelConsumer {
    verifier: StreamVerifier,
    streams: Mutex<HashMap<String, broadcast::Sender<Payload>>>,
}

const CHANNEL_CAPACITY: usize = 100;

impl ChannelConsumer {
    pub fn new(verifier: StreamVerifier) -> Self {
        Self {
            verifier,
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn stream_receiver(&self, stream_name: &str) -> broadcast::Receiver<Payload> {
        let mut streams = self.streams.lock().expect("stream map poisoned");
        streams
            .entry(stream_name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Consumer for ChannelConsumer {
    fn subscribe(&self, signed_stream_name: &str) -> SubscriptionHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        match self.verifier.verified(signed_stream_name) {
            None => {
                let _ = tx.send(SubscriptionEvent::Rejected);
            }
            Some(stream_name) => {
                let mut payloads = self.stream_receiver(&stream_name);
                let _ = tx.send(SubscriptionEvent::Connected);
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            payload = payloads.recv() => match payload {
                                Ok(payload) => {
                                    if tx.send(SubscriptionEvent::Received(payload)).is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                                Err(broadcast::error::RecvError::Closed) => break,
                            },
                            _ = tx.closed() => break,
                        }
                    }
                });
            }
        }

        SubscriptionHandle { events: rx }
    }
}

impl Transport for ChannelConsumer {
    fn broadcast(&self, stream_name: &str, payload: Payload) {
        let streams = self.streams.lock().expect("stream map poisoned");
        if let Some(tx) = streams.get(stream_name) {
            let _ = tx.send(payload);
        }
    }
}
