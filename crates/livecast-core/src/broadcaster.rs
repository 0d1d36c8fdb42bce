//! The broadcast dispatcher.
//!
//! Every outbound broadcast funnels through [`Broadcaster::broadcast`]; it
//! is the only call site of the transport primitive, so suppression and
//! observation can never be bypassed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::payload::Payload;
use crate::stream_name::{stream_name_from, StreamTarget};
use crate::suppressor::Suppressor;

/// The raw delivery primitive: fan a payload out to every socket currently
/// subscribed to the stream. Fire-and-forget; implementations queue
/// internally and never block the caller.
pub trait Transport: Send + Sync {
    fn broadcast(&self, stream_name: &str, payload: Payload);
}

/// Transport that drops everything. Useful when wiring a broadcaster whose
/// deliveries are observed rather than delivered.
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn broadcast(&self, _stream_name: &str, _payload: Payload) {}
}

type ObserverCallback = Box<dyn Fn(&str, &Payload) + Send + Sync>;

/// Identifies a registered observer so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverHandle(u64);

/// Dispatches payloads to the transport, honoring suppression and notifying
/// registered observers first.
///
/// The observer registry is per-instance, so tests can use isolated
/// broadcasters without cross-test leakage.
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    observers: Mutex<Vec<(u64, ObserverCallback)>>,
    next_observer: AtomicU64,
}

impl Broadcaster {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    /// Resolve `target` and dispatch `payload` to its stream.
    ///
    /// Short-circuits silently under global suppression. Never fails: zero
    /// observers and empty stream names are both allowed.
    pub fn broadcast(&self, target: impl Into<StreamTarget>, payload: Payload) {
        let stream_name = stream_name_from(target);

        if Suppressor::suppressed() {
            debug!(stream = %stream_name, "broadcast suppressed");
            return;
        }
        if stream_name.is_empty() {
            debug!("broadcasting on empty stream name");
        }

        let observers = self.observers.lock().expect("observer registry poisoned");
        for (_, callback) in observers.iter() {
            callback(&stream_name, &payload);
        }
        drop(observers);

        debug!(stream = %stream_name, "broadcast dispatched");
        self.transport.broadcast(&stream_name, payload);
    }

    /// Register an observer invoked with `(stream_name, payload)` on every
    /// non-suppressed broadcast, before the transport sees it.
    pub fn on_broadcast(
        &self,
        callback: impl Fn(&str, &Payload) + Send + Sync + 'static,
    ) -> ObserverHandle {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .expect("observer registry poisoned")
            .push((id, Box::new(callback)));
        ObserverHandle(id)
    }

    /// Remove a previously registered observer. Unknown handles are a no-op.
    pub fn off_broadcast(&self, handle: ObserverHandle) {
        self.observers
            .lock()
            .expect("observer registry poisoned")
            .retain(|(id, _)| *id != handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Action;
    use std::sync::atomic::AtomicUsize;

    struct CountingTransport(AtomicUsize);

    impl Transport for CountingTransport {
        fn broadcast(&self, _stream_name: &str, _payload: Payload) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Broadcaster, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport(AtomicUsize::new(0)));
        (Broadcaster::new(transport.clone()), transport)
    }

    fn refresh() -> Payload {
        Payload::refresh("Post", Some(1), Action::Update, None)
    }

    #[test]
    fn delivers_to_transport_and_observers() {
        let (broadcaster, transport) = counting();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        broadcaster.on_broadcast(move |stream, payload| {
            sink.lock().unwrap().push((stream.to_string(), payload.clone()));
        });

        broadcaster.broadcast("posts", refresh());

        assert_eq!(transport.0.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "posts");
    }

    #[test]
    fn suppression_blocks_transport_and_observers() {
        let (broadcaster, transport) = counting();
        let count = Arc::new(AtomicUsize::new(0));
        let observed = count.clone();
        broadcaster.on_broadcast(move |_, _| {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        Suppressor::suppressing(|| {
            broadcaster.broadcast("posts", refresh());
        });

        assert_eq!(transport.0.load(Ordering::SeqCst), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_observers_is_fine() {
        let (broadcaster, transport) = counting();
        broadcaster.broadcast("posts", refresh());
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_observers_stop_firing() {
        let (broadcaster, _) = counting();
        let count = Arc::new(AtomicUsize::new(0));
        let observed = count.clone();
        let handle = broadcaster.on_broadcast(move |_, _| {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        broadcaster.broadcast("posts", refresh());
        broadcaster.off_broadcast(handle);
        broadcaster.broadcast("posts", refresh());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_stream_name_is_allowed_through() {
        let (broadcaster, transport) = counting();
        broadcaster.broadcast(Vec::<StreamTarget>::new(), refresh());
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolves_flexible_target_shapes() {
        let (broadcaster, _) = counting();
        let streams = Arc::new(Mutex::new(Vec::new()));
        let sink = streams.clone();
        broadcaster.on_broadcast(move |stream, _| {
            sink.lock().unwrap().push(stream.to_string());
        });

        broadcaster.broadcast(vec!["boards", "posts"], refresh());

        assert_eq!(*streams.lock().unwrap(), vec!["boards:posts".to_string()]);
    }
}
