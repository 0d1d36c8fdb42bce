//! Live stream subscriptions with debounced reloads.
//!
//! A [`StreamSubscription`] reconstructs a server-signed stream token into
//! a live subscription and turns incoming refresh signals into a single
//! trailing-debounced partial-reload request. Reloads are fire-and-forget
//! to the surrounding navigation layer; nothing here blocks on network I/O.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use livecast_core::Payload;

use crate::consumer::{Consumer, SubscriptionEvent, SubscriptionHandle};

/// Default trailing-debounce window for reload requests.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Lifecycle of one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Terminated,
}

/// Partial-reload request handed to the navigation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadRequest {
    /// Prop names to reload; empty means all.
    pub only: Vec<String>,
    /// Prop names to leave alone.
    pub except: Vec<String>,
}

type Callback = Arc<dyn Fn() + Send + Sync>;
type PayloadCallback = Arc<dyn Fn(&Payload) + Send + Sync>;
type ReloadFn = Arc<dyn Fn(ReloadRequest) + Send + Sync>;

/// Subscription options, mirroring what a page passes when it mounts.
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    only: Vec<String>,
    except: Vec<String>,
    debounce: Option<Duration>,
    disabled: bool,
    on_refresh: Option<PayloadCallback>,
    on_message: Option<PayloadCallback>,
    on_connected: Option<Callback>,
    on_disconnected: Option<Callback>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope reloads to these prop names.
    pub fn only(mut self, props: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.only = props.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude these prop names from reloads.
    pub fn except(mut self, props: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.except = props.into_iter().map(Into::into).collect();
        self
    }

    /// Override the 100ms default debounce window.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Disable entirely: no subscription is made at all.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Called for each refresh payload, before the debounced reload.
    pub fn on_refresh(mut self, f: impl Fn(&Payload) + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(f));
        self
    }

    /// Called for each message payload; no reload is implied.
    pub fn on_message(mut self, f: impl Fn(&Payload) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }
}

/// A mounted subscription: one consumer registration, one state machine,
/// at most one pending reload timer.
///
/// Dropping it terminates the subscription, cancelling the timer and the
/// registration synchronously. To change tokens, drop the old subscription
/// and subscribe again — two live subscriptions never coexist for one
/// binding.
pub struct StreamSubscription {
    state: Arc<Mutex<SubscriptionState>>,
    task: Option<JoinHandle<()>>,
}

impl StreamSubscription {
    /// Subscribe through `consumer` with a signed stream token.
    ///
    /// `reload` is the navigation layer's partial-reload primitive; it is
    /// invoked from the runtime task and must not block. A `None` token or
    /// disabled options produce an inert subscription that never connects.
    pub fn subscribe(
        consumer: &dyn Consumer,
        signed_stream_name: Option<&str>,
        options: SubscribeOptions,
        reload: impl Fn(ReloadRequest) + Send + Sync + 'static,
    ) -> Self {
        let token = match signed_stream_name {
            Some(token) if !options.disabled => token,
            _ => {
                return Self {
                    state: Arc::new(Mutex::new(SubscriptionState::Idle)),
                    task: None,
                }
            }
        };

        let handle = consumer.subscribe(token);
        let state = Arc::new(Mutex::new(SubscriptionState::Connecting));
        let task = tokio::spawn(run(handle, options, Arc::new(reload), state.clone()));

        Self {
            state,
            task: Some(task),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.lock().expect("subscription state poisoned")
    }

    pub fn connected(&self) -> bool {
        self.state() == SubscriptionState::Connected
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.state.lock().expect("subscription state poisoned") = SubscriptionState::Terminated;
    }
}

async fn run(
    mut handle: SubscriptionHandle,
    options: SubscribeOptions,
    reload: ReloadFn,
    state: Arc<Mutex<SubscriptionState>>,
) {
    let window = options.debounce.unwrap_or(DEFAULT_DEBOUNCE);
    let mut has_connected = false;
    let mut reload_at: Option<tokio::time::Instant> = None;

    let set_state = |next: SubscriptionState| {
        *state.lock().expect("subscription state poisoned") = next;
    };

    loop {
        let deadline = reload_at;
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = handle.events.recv() => match event {
                Some(SubscriptionEvent::Connected) => {
                    set_state(SubscriptionState::Connected);
                    if let Some(cb) = &options.on_connected {
                        cb();
                    }
                    // Catch up on anything missed while disconnected.
                    if has_connected {
                        debug!("reconnected, scheduling catch-up reload");
                        reload_at = Some(tokio::time::Instant::now() + window);
                    }
                    has_connected = true;
                }
                Some(SubscriptionEvent::Disconnected) => {
                    set_state(SubscriptionState::Disconnected);
                    if let Some(cb) = &options.on_disconnected {
                        cb();
                    }
                }
                Some(SubscriptionEvent::Rejected) => {
                    debug!("subscription rejected");
                    set_state(SubscriptionState::Terminated);
                    return;
                }
                Some(SubscriptionEvent::Received(payload)) => {
                    if *state.lock().expect("subscription state poisoned")
                        != SubscriptionState::Connected
                    {
                        continue;
                    }
                    match &payload {
                        Payload::Refresh { .. } => {
                            if let Some(cb) = &options.on_refresh {
                                cb(&payload);
                            }
                            // Trailing debounce: each refresh pushes the
                            // deadline out again.
                            reload_at = Some(tokio::time::Instant::now() + window);
                        }
                        Payload::Message { .. } => {
                            if let Some(cb) = &options.on_message {
                                cb(&payload);
                            }
                        }
                    }
                }
                None => {
                    set_state(SubscriptionState::Terminated);
                    return;
                }
            },
            _ = timer => {
                reload_at = None;
                reload(ReloadRequest {
                    only: options.only.clone(),
                    except: options.except.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecast_core::Action;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Consumer whose events are driven by the test.
    struct ScriptedConsumer {
        senders: Mutex<Vec<mpsc::UnboundedSender<SubscriptionEvent>>>,
        subscribes: AtomicUsize,
    }

    impl ScriptedConsumer {
        fn new() -> Self {
            Self {
                senders: Mutex::new(Vec::new()),
                subscribes: AtomicUsize::new(0),
            }
        }

        fn sender(&self) -> mpsc::UnboundedSender<SubscriptionEvent> {
            self.senders.lock().unwrap().last().unwrap().clone()
        }
    }

    impl Consumer for ScriptedConsumer {
        fn subscribe(&self, _signed_stream_name: &str) -> SubscriptionHandle {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            self.senders.lock().unwrap().push(tx);
            SubscriptionHandle { events: rx }
        }
    }

    fn refresh() -> SubscriptionEvent {
        SubscriptionEvent::Received(Payload::refresh("Message", Some(1), Action::Update, None))
    }

    fn reload_counter() -> (Arc<AtomicUsize>, impl Fn(ReloadRequest) + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        (count, move |_req| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        // Let the runtime task absorb pending events under paused time.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_debounce_collapses_refreshes() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();

        let sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new(),
            reload,
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        settle().await;
        assert!(sub.connected());

        // Refresh at t=0 and t=50ms with a 100ms window: one reload at 150ms.
        tx.send(refresh()).unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tx.send(refresh()).unwrap();
        settle().await;

        tokio::time::advance(Duration::from_millis(99)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0, "timer reset by second refresh");

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1, "exactly one trailing reload");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_callback_fires_before_the_reload() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();
        let refreshes = Arc::new(AtomicUsize::new(0));
        let seen = refreshes.clone();

        let _sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new().on_refresh(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
            reload,
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        tx.send(refresh()).unwrap();
        settle().await;

        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(reloads.load(Ordering::SeqCst), 0, "reload still pending");
    }

    #[tokio::test(start_paused = true)]
    async fn messages_invoke_the_callback_without_reloading() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();
        let messages = Arc::new(AtomicUsize::new(0));
        let seen = messages.clone();

        let _sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new().on_message(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
            reload,
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        tx.send(SubscriptionEvent::Received(Payload::message(
            serde_json::json!({"typing": true}),
        )))
        .unwrap();
        settle().await;

        assert_eq!(messages.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 0, "messages never reload");
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_schedules_a_catch_up_reload() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();

        let sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new(),
            reload,
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        settle().await;
        tx.send(SubscriptionEvent::Disconnected).unwrap();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Disconnected);
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        // Reconnect: no refresh payload arrives, yet one reload is due.
        tx.send(SubscriptionEvent::Connected).unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(101)).await;
        settle().await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_connect_does_not_reload() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();

        let _sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new(),
            reload,
        );
        consumer.sender().send(SubscriptionEvent::Connected).unwrap();
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_terminates() {
        let consumer = ScriptedConsumer::new();
        let (_, reload) = reload_counter();

        let sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new(),
            reload,
        );
        consumer.sender().send(SubscriptionEvent::Rejected).unwrap();
        settle().await;

        assert_eq!(sub.state(), SubscriptionState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_or_tokenless_makes_no_subscription() {
        let consumer = ScriptedConsumer::new();
        let (_, reload) = reload_counter();
        let sub =
            StreamSubscription::subscribe(&consumer, None, SubscribeOptions::new(), reload);
        assert_eq!(sub.state(), SubscriptionState::Idle);

        let (_, reload) = reload_counter();
        let sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new().disabled(),
            reload,
        );
        assert_eq!(sub.state(), SubscriptionState::Idle);
        assert_eq!(consumer.subscribes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_pending_reload() {
        let consumer = ScriptedConsumer::new();
        let (reloads, reload) = reload_counter();

        let sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new(),
            reload,
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        tx.send(refresh()).unwrap();
        settle().await;

        drop(sub);
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(reloads.load(Ordering::SeqCst), 0, "timer cancelled on unmount");
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_over_the_loopback_consumer() {
        use crate::consumer::ChannelConsumer;
        use livecast_core::{Broadcaster, StreamVerifier};

        let verifier = StreamVerifier::new("test-secret");
        let consumer = Arc::new(ChannelConsumer::new(verifier.clone()));
        let broadcaster = Broadcaster::new(consumer.clone());
        let (reloads, reload) = reload_counter();

        let token = verifier.signed_stream_name(vec!["chat", "7"]);
        let sub = StreamSubscription::subscribe(
            consumer.as_ref(),
            Some(&token),
            SubscribeOptions::new(),
            reload,
        );
        settle().await;
        assert!(sub.connected());

        broadcaster.broadcast(
            vec!["chat", "7"],
            Payload::refresh("Message", Some(1), Action::Create, None),
        );
        settle().await;
        tokio::time::advance(Duration::from_millis(101)).await;
        settle().await;

        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_scopes_props() {
        let consumer = ScriptedConsumer::new();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sink = requests.clone();

        let _sub = StreamSubscription::subscribe(
            &consumer,
            Some("token"),
            SubscribeOptions::new().only(["messages"]).except(["stats"]),
            move |req| sink.lock().unwrap().push(req),
        );
        let tx = consumer.sender();
        tx.send(SubscriptionEvent::Connected).unwrap();
        tx.send(refresh()).unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(101)).await;
        settle().await;

        let requests = requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![ReloadRequest {
                only: vec!["messages".to_string()],
                except: vec!["stats".to_string()],
            }]
        );
    }
}
