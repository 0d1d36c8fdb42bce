//! Broadcast capture helpers for deterministic test assertions.
//!
//! Built on the dispatcher's observer registry, so nothing here touches the
//! transport. Used by this workspace's own tests and available to
//! downstream test suites.

use std::sync::{Arc, Mutex};

use crate::broadcaster::{Broadcaster, ObserverHandle};
use crate::payload::Payload;
use crate::stream_name::{stream_name_from, StreamTarget};

/// Captures every payload dispatched to one stream while alive.
///
/// ```ignore
/// let capture = BroadcastCapture::on(&broadcaster, "chat");
/// binder.committed(&rules, &message).await;
/// assert_eq!(capture.payloads().len(), 1);
/// ```
pub struct BroadcastCapture<'a> {
    broadcaster: &'a Broadcaster,
    handle: ObserverHandle,
    collected: Arc<Mutex<Vec<Payload>>>,
}

impl<'a> BroadcastCapture<'a> {
    /// Start capturing broadcasts on the stream `target` resolves to.
    pub fn on(broadcaster: &'a Broadcaster, target: impl Into<StreamTarget>) -> Self {
        let stream_name = stream_name_from(target);
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let handle = broadcaster.on_broadcast(move |stream, payload| {
            if stream == stream_name {
                sink.lock().expect("capture poisoned").push(payload.clone());
            }
        });
        Self {
            broadcaster,
            handle,
            collected,
        }
    }

    /// Payloads captured so far.
    pub fn payloads(&self) -> Vec<Payload> {
        self.collected.lock().expect("capture poisoned").clone()
    }

    /// Stop capturing and return everything seen.
    pub fn finish(self) -> Vec<Payload> {
        self.payloads()
    }
}

impl Drop for BroadcastCapture<'_> {
    fn drop(&mut self) {
        self.broadcaster.off_broadcast(self.handle);
    }
}

/// Capture all broadcasts to a stream within a synchronous block.
pub fn capture_broadcasts_on(
    broadcaster: &Broadcaster,
    target: impl Into<StreamTarget>,
    f: impl FnOnce(),
) -> Vec<Payload> {
    let capture = BroadcastCapture::on(broadcaster, target);
    f();
    capture.finish()
}

/// Assert a block broadcasts to the stream exactly `count` times.
pub fn assert_broadcasts_on(
    broadcaster: &Broadcaster,
    target: impl Into<StreamTarget>,
    count: usize,
    f: impl FnOnce(),
) -> Vec<Payload> {
    let target = target.into();
    let stream_name = target.resolve();
    let payloads = capture_broadcasts_on(broadcaster, target, f);
    assert_eq!(
        count,
        payloads.len(),
        "expected {count} broadcast(s) on {stream_name:?}, got {}",
        payloads.len()
    );
    payloads
}

/// Assert a block does not broadcast to the stream at all.
pub fn assert_no_broadcasts_on(
    broadcaster: &Broadcaster,
    target: impl Into<StreamTarget>,
    f: impl FnOnce(),
) {
    assert_broadcasts_on(broadcaster, target, 0, f);
}
