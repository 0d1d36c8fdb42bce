//! Livecast Client
//!
//! Client-side subscription runtime: turns a signed stream token into a
//! live subscription whose refresh signals drive a debounced partial
//! reload, with catch-up on reconnect.

pub mod consumer;
pub mod subscription;

pub use consumer::{ChannelConsumer, Consumer, SubscriptionEvent, SubscriptionHandle};
pub use subscription::{
    ReloadRequest, StreamSubscription, SubscribeOptions, SubscriptionState,
};
