//! Livecast Core
//!
//! Broadcast dispatch core: turns committed data mutations into signed,
//! addressable stream broadcasts that tell subscribed clients their view is
//! stale. Transport, persistence and HTTP layers stay external; they plug
//! in through the `Transport`, `Broadcastable` and `DebounceStore` seams.

pub mod broadcastable;
pub mod broadcaster;
pub mod config;
pub mod debounce;
pub mod error;
pub mod payload;
pub mod queue;
pub mod stream_name;
pub mod suppressor;
pub mod test_helper;
pub mod verifier;

pub use broadcastable::{Binder, Broadcastable, Rule, Rules, StreamSpec};
pub use broadcaster::{Broadcaster, ObserverHandle, Transport};
pub use config::Config;
pub use debounce::{DebounceStore, Debouncer, MemoryDebounceStore};
pub use error::{LivecastError, LivecastResult};
pub use payload::{Action, Payload};
pub use queue::{BroadcastQueue, InlineQueue, SpawnQueue};
pub use stream_name::{stream_name_from, GlobalIdentity, StreamTarget};
pub use suppressor::Suppressor;
pub use verifier::StreamVerifier;
