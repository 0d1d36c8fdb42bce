//! Mutation-to-broadcast binding.
//!
//! A resource type registers declarative [`Rule`]s describing which
//! lifecycle commits broadcast to which streams. The application's commit
//! hooks call [`Binder::committed`] once per durable mutation; each rule is
//! evaluated independently against the instance.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::broadcaster::Broadcaster;
use crate::debounce::Debouncer;
use crate::payload::{Action, Payload};
use crate::queue::BroadcastQueue;
use crate::stream_name::{stream_name_from, StreamTarget};
use crate::suppressor::Suppressor;

/// A resource type whose mutations can drive broadcasts.
///
/// Implementations expose just enough lifecycle state for event-kind
/// inference; the ORM itself stays external.
pub trait Broadcastable {
    /// Resource type name as it appears in refresh payloads, e.g. `"Message"`.
    fn model_name() -> &'static str
    where
        Self: Sized;

    /// Stable record identity, when persisted.
    fn record_id(&self) -> Option<i64>;

    /// True once the instance has been deleted.
    fn destroyed(&self) -> bool;

    /// True when the current commit is the instance's first.
    fn first_commit(&self) -> bool;

    /// Look up a named field as a stream target, for [`StreamSpec::FieldRef`].
    fn stream_field(&self, _field: &str) -> Option<StreamTarget> {
        None
    }

    /// Default stream for rule-less refreshes: the lowercased plural name.
    fn collection_stream() -> String
    where
        Self: Sized,
    {
        format!("{}s", Self::model_name().to_lowercase())
    }

    /// Infer the event kind from the instance's own lifecycle state.
    fn inferred_action(&self) -> Action {
        if self.destroyed() {
            Action::Destroy
        } else if self.first_commit() {
            Action::Create
        } else {
            Action::Update
        }
    }
}

/// How a rule names its target stream: a fixed name, a field looked up on
/// the instance, or a function of the instance.
#[derive(Clone)]
pub enum StreamSpec<M> {
    Literal(String),
    FieldRef(String),
    Computed(Arc<dyn Fn(&M) -> StreamTarget + Send + Sync>),
}

impl<M: Broadcastable> StreamSpec<M> {
    pub fn field(name: impl Into<String>) -> Self {
        StreamSpec::FieldRef(name.into())
    }

    pub fn computed(f: impl Fn(&M) -> StreamTarget + Send + Sync + 'static) -> Self {
        StreamSpec::Computed(Arc::new(f))
    }

    fn resolve(&self, instance: &M) -> StreamTarget {
        match self {
            StreamSpec::Literal(name) => StreamTarget::Part(name.clone()),
            StreamSpec::FieldRef(field) => instance
                .stream_field(field)
                .unwrap_or(StreamTarget::Many(Vec::new())),
            StreamSpec::Computed(f) => f(instance),
        }
    }
}

impl<M> From<&str> for StreamSpec<M> {
    fn from(name: &str) -> Self {
        StreamSpec::Literal(name.to_string())
    }
}

impl<M> From<String> for StreamSpec<M> {
    fn from(name: String) -> Self {
        StreamSpec::Literal(name)
    }
}

type Guard<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;
type ExtraFn<M> = Arc<dyn Fn(&M) -> serde_json::Value + Send + Sync>;

/// One declarative binding: which events, under which guards, broadcast to
/// which stream, with what extra data, debounced or not.
#[derive(Clone)]
pub struct Rule<M> {
    spec: StreamSpec<M>,
    events: Vec<Action>,
    if_guard: Option<Guard<M>>,
    unless_guard: Option<Guard<M>>,
    extra: Option<ExtraFn<M>>,
    debounce: Option<Option<Duration>>,
}

impl<M: Broadcastable> Rule<M> {
    /// Rule broadcasting to `spec` on every lifecycle event.
    pub fn to(spec: impl Into<StreamSpec<M>>) -> Self {
        Self {
            spec: spec.into(),
            events: Action::ALL.to_vec(),
            if_guard: None,
            unless_guard: None,
            extra: None,
            debounce: None,
        }
    }

    /// Restrict the rule to a subset of lifecycle events.
    pub fn on(mut self, events: impl IntoIterator<Item = Action>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    /// Fire only when the predicate holds.
    pub fn only_if(mut self, guard: impl Fn(&M) -> bool + Send + Sync + 'static) -> Self {
        self.if_guard = Some(Arc::new(guard));
        self
    }

    /// Skip when the predicate holds.
    pub fn unless(mut self, guard: impl Fn(&M) -> bool + Send + Sync + 'static) -> Self {
        self.unless_guard = Some(Arc::new(guard));
        self
    }

    /// Attach extra data to each refresh payload.
    pub fn with_extra(
        mut self,
        extra: impl Fn(&M) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.extra = Some(Arc::new(extra));
        self
    }

    /// Route non-destroy broadcasts through the debounce gate, using the
    /// configured default window.
    pub fn debounced(mut self) -> Self {
        self.debounce = Some(None);
        self
    }

    /// Debounce with an explicit window.
    pub fn debounced_by(mut self, delay: Duration) -> Self {
        self.debounce = Some(Some(delay));
        self
    }

    /// Guards pass when `only_if` (if present) holds and `unless` (if
    /// present) does not. Guard panics propagate to the commit path.
    fn passes(&self, instance: &M) -> bool {
        if let Some(guard) = &self.if_guard {
            if !guard(instance) {
                return false;
            }
        }
        if let Some(guard) = &self.unless_guard {
            if guard(instance) {
                return false;
            }
        }
        true
    }
}

/// Explicit per-type rule registry, built once at type definition time and
/// iterated on every commit.
#[derive(Clone)]
pub struct Rules<M> {
    rules: Vec<Rule<M>>,
}

impl<M: Broadcastable> Rules<M> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registry with a single all-events rule targeting `spec` — the
    /// common "this type refreshes that stream" case.
    pub fn refreshes_to(spec: impl Into<StreamSpec<M>>) -> Self {
        Self::new().rule(Rule::to(spec))
    }

    /// Registry refreshing the type's own collection stream.
    pub fn refreshes() -> Self {
        Self::refreshes_to(M::collection_stream())
    }

    pub fn rule(mut self, rule: Rule<M>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<M> Default for Rules<M> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

/// Evaluates bindings on commit and routes the resulting payloads.
///
/// Routing per rule: destroys dispatch synchronously (the record is gone,
/// nothing to fetch later makes waiting worthwhile), debounced rules go
/// through the gate, everything else is enqueued for out-of-band delivery.
pub struct Binder {
    broadcaster: Arc<Broadcaster>,
    debouncer: Arc<Debouncer>,
    queue: Arc<dyn BroadcastQueue>,
}

impl Binder {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        debouncer: Arc<Debouncer>,
        queue: Arc<dyn BroadcastQueue>,
    ) -> Self {
        Self {
            broadcaster,
            debouncer,
            queue,
        }
    }

    /// Evaluate every rule for a committed instance.
    ///
    /// Call once per successful, durable mutation, after the surrounding
    /// transaction commits. The event kind comes from the instance's own
    /// lifecycle state, never from the rule's configured event list.
    pub async fn committed<M: Broadcastable>(&self, rules: &Rules<M>, instance: &M) {
        let action = instance.inferred_action();

        if Suppressor::blocked(M::model_name()) {
            debug!(model = M::model_name(), "commit broadcasts suppressed");
            return;
        }

        for rule in &rules.rules {
            if !rule.events.contains(&action) || !rule.passes(instance) {
                continue;
            }

            let target = rule.spec.resolve(instance);
            let extra = rule.extra.as_ref().map(|f| f(instance));
            let payload = Payload::refresh(M::model_name(), instance.record_id(), action, extra);

            match (action, rule.debounce) {
                (Action::Destroy, _) => self.broadcaster.broadcast(target, payload),
                (_, Some(delay)) => {
                    self.debouncer
                        .broadcast_if_not_recent(target, payload, delay)
                        .await
                }
                (_, None) => self.queue.enqueue(stream_name_from(target), payload),
            }
        }
    }

    /// Ad-hoc synchronous refresh, independent of any registered rule.
    pub fn broadcast_refresh_to<M: Broadcastable>(
        &self,
        instance: &M,
        target: impl Into<StreamTarget>,
        extra: Option<serde_json::Value>,
    ) {
        if Suppressor::blocked(M::model_name()) {
            return;
        }
        let payload =
            Payload::refresh(M::model_name(), instance.record_id(), instance.inferred_action(), extra);
        self.broadcaster.broadcast(target, payload);
    }

    /// Ad-hoc refresh delivered out-of-band.
    pub fn broadcast_refresh_later_to<M: Broadcastable>(
        &self,
        instance: &M,
        target: impl Into<StreamTarget>,
        extra: Option<serde_json::Value>,
    ) {
        if Suppressor::blocked(M::model_name()) {
            return;
        }
        let payload =
            Payload::refresh(M::model_name(), instance.record_id(), instance.inferred_action(), extra);
        self.queue.enqueue(stream_name_from(target), payload);
    }

    /// Refresh the type's collection stream.
    pub fn broadcast_refresh<M: Broadcastable>(&self, instance: &M) {
        self.broadcast_refresh_to(instance, M::collection_stream(), None);
    }

    /// Ad-hoc data message, no reload implied. The instance only pins the
    /// model type for the suppression check; messages carry no provenance.
    pub fn broadcast_message_to<M: Broadcastable>(
        &self,
        _instance: &M,
        target: impl Into<StreamTarget>,
        data: serde_json::Value,
    ) {
        if Suppressor::blocked(M::model_name()) {
            return;
        }
        self.broadcaster.broadcast(target, Payload::message(data));
    }
}
