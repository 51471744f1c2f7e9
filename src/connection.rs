//! Connection lifecycle state machine and public bridge surface.
//!
//! A [`Connection`] owns one bridge to the script context: the outbound and
//! inbound channels, the hub registry, and the lifecycle state driven by
//! routed envelopes:
//!
//! ```text
//! Created ──ready──▶ Ready ──connected──▶ Connected
//!                      │                      │
//!                      └──────disconnected────┴──▶ Disconnected
//! ```
//!
//! There is no transition back to `Created`, no timeout, and no reconnection
//! at this layer; the embedded library may reconnect on its own and re-emit
//! `connected`. A connection that never observes `ready` never fires its
//! ready handler; that is a property of the transport, not a failure the
//! bridge can detect.
//!
//! The handle is cheaply cloneable (shared interior behind an `Arc`, like
//! the channel handles). Two documented gaps are preserved from the wire
//! protocol: [`send`](Connection::send) and
//! [`set_query_string`](Connection::set_query_string) evaluate immediately
//! regardless of lifecycle state, so traffic issued before `ready` reaches a
//! script context that may not be listening yet.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::channel::{EvalObserver, InboundChannel, Intercept, OutboundChannel};
use crate::engine::ScriptHost;
use crate::hub::Hub;
use crate::protocol::{script_literal, LifecycleSignal, NULL_LITERAL};
use crate::router::UnroutedObserver;

/// Connection flavor, decided at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Hub-style connection with named hubs and method routing.
    Hub,
    /// Persistent connection carrying only generic payloads.
    Persistent,
}

/// Lifecycle state, driven entirely by routed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed; the script bootstrap has not signalled readiness.
    Created,
    /// Script context is initialized and the ready handler has run.
    Ready,
    /// Underlying transport reports connected.
    Connected,
    /// Underlying transport reports disconnected. Terminal for this layer
    /// only; a later `connected` signal is accepted.
    Disconnected,
}

/// What the host's navigation layer should do with an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPolicy {
    /// Not bridge traffic; let the navigation proceed.
    Allow,
    /// Bridge traffic (whether or not it decoded); cancel the navigation.
    Suppress,
}

/// One-shot handler fired when the connection becomes ready.
///
/// Runs strictly between the `initialize` and `start` evaluations, which is
/// the window for registering hub handlers before traffic starts.
pub type ReadyHandler = Box<dyn FnOnce(&Connection) + Send>;

/// Callback for generic `data` envelopes.
pub type DataCallback = Box<dyn FnMut(&Value) + Send>;

/// Observer for transport lifecycle signals (`connected`/`disconnected`).
pub type LifecycleObserver = Box<dyn FnMut(LifecycleSignal) + Send>;

pub(crate) struct ConnectionShared {
    pub(crate) url: String,
    pub(crate) kind: ConnectionKind,
    pub(crate) outbound: OutboundChannel,
    pub(crate) inbound: InboundChannel,
    pub(crate) state: Mutex<LifecycleState>,
    /// Hub registry, keyed by case-folded hub name.
    pub(crate) hubs: Mutex<HashMap<String, Hub>>,
    pub(crate) ready: Mutex<Option<ReadyHandler>>,
    pub(crate) received: Mutex<Option<Arc<Mutex<DataCallback>>>>,
    pub(crate) lifecycle: Mutex<Option<Arc<Mutex<LifecycleObserver>>>>,
    pub(crate) unrouted: Mutex<Option<Arc<Mutex<UnroutedObserver>>>>,
    pub(crate) query_string: Mutex<Option<Value>>,
}

/// Handle to one host <-> script bridge.
#[derive(Clone)]
pub struct Connection {
    pub(crate) shared: Arc<ConnectionShared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hub_count = self.shared.hubs.lock().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("Connection")
            .field("url", &self.shared.url)
            .field("kind", &self.shared.kind)
            .field("state", &self.state())
            .field("hub_count", &hub_count)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Start building a connection to `url` over the given engine.
    pub fn builder(host: Arc<dyn ScriptHost>, url: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(host, url.into())
    }

    /// Target URL, the connection's identity.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Connection flavor.
    pub fn kind(&self) -> ConnectionKind {
        self.shared.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.shared.state.lock().expect("connection state mutex poisoned")
    }

    /// Last query-string value assigned, if any.
    pub fn query_string(&self) -> Option<Value> {
        self.shared.query_string.lock().expect("query string mutex poisoned").clone()
    }

    /// Get or create the hub proxy registered under `name`.
    ///
    /// Idempotent per case-folded name: `create_hub_proxy("Chat")` and
    /// `create_hub_proxy("chat")` return the same hub (the first caller's
    /// casing wins for wire traffic). Creation evaluates the guarded
    /// script-side proxy creation statement.
    pub fn create_hub_proxy(&self, name: &str) -> Hub {
        let (hub, created) = {
            let mut hubs = self.shared.hubs.lock().expect("hub registry mutex poisoned");
            match hubs.get(&name.to_lowercase()) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let hub = Hub::new(name, self.shared.outbound.clone());
                    hubs.insert(name.to_lowercase(), hub.clone());
                    (hub, true)
                }
            }
        };
        if created {
            self.shared.outbound.ensure_hub(hub.name());
        }
        hub
    }

    /// Send a generic payload: `connection.send(<literal>)`.
    ///
    /// Evaluated immediately regardless of lifecycle state (preserved gap,
    /// see the module docs). A value that cannot be encoded degrades to the
    /// literal `null` with a warning; use `&serde_json::Value::Null` to send
    /// an intentional null.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) {
        let literal = match script_literal(data) {
            Ok(literal) => literal,
            Err(err) => {
                log::warn!("{}: sending null for unencodable payload: {err}", self.url());
                NULL_LITERAL.to_string()
            }
        };
        self.shared.outbound.send_payload(&literal);
    }

    /// Assign the connection's query-string object: `connection.qs = <json>`.
    ///
    /// Re-evaluates the assignment on every call, including before `ready`
    /// (preserved gap). An unencodable value is dropped with a warning and
    /// no statement is evaluated.
    pub fn set_query_string<T: Serialize + ?Sized>(&self, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("{}: dropping unencodable query string: {err}", self.url());
                return;
            }
        };
        self.shared.outbound.assign_query_string(&json.to_string());
        let mut slot = self.shared.query_string.lock().expect("query string mutex poisoned");
        *slot = Some(json);
    }

    /// Install the generic-data callback, returning the one it replaced.
    pub fn on_received(
        &self,
        callback: impl FnMut(&Value) + Send + 'static,
    ) -> Option<DataCallback> {
        replace_callback(&self.shared.received, Box::new(callback))
    }

    /// Install the lifecycle observer, returning the one it replaced.
    ///
    /// Notified for `connected` and `disconnected`; readiness has its own
    /// one-shot handler supplied at construction.
    pub fn on_lifecycle(
        &self,
        observer: impl FnMut(LifecycleSignal) + Send + 'static,
    ) -> Option<LifecycleObserver> {
        replace_callback(&self.shared.lifecycle, Box::new(observer))
    }

    /// Install the unrouted-message observer, returning the one it replaced.
    ///
    /// Without an observer, unroutable messages are silently dropped (the
    /// transport's historical default).
    pub fn on_unrouted(
        &self,
        observer: impl FnMut(&crate::router::Unrouted) + Send + 'static,
    ) -> Option<UnroutedObserver> {
        replace_callback(&self.shared.unrouted, Box::new(observer))
    }

    /// Install the outbound evaluation observer.
    ///
    /// The observer is notified once per evaluated statement, in issue
    /// order, with the engine's result. This is the optional completion
    /// notification for the otherwise fire-and-forget outbound calls.
    pub fn on_eval(&self, observer: impl FnMut(&str, Option<&str>) + Send + 'static) {
        self.shared.outbound.set_observer(Box::new(observer));
    }

    /// Offer an outgoing navigation request to the bridge.
    ///
    /// The host's navigation layer must call this for every request the
    /// script context emits and honor the returned policy. This is the sole
    /// script -> host signaling path: reserved-scheme targets are decoded,
    /// routed, and suppressed; all other targets are allowed through.
    pub fn handle_navigation(&self, target: &str) -> NavigationPolicy {
        match self.shared.inbound.intercept(target) {
            Intercept::Pass => NavigationPolicy::Allow,
            Intercept::Handled(envelope) => {
                self.route(envelope);
                NavigationPolicy::Suppress
            }
            Intercept::Dropped(err) => {
                log::warn!("{}: dropping inbound message: {err}", self.url());
                NavigationPolicy::Suppress
            }
        }
    }
}

/// Swap a callback slot, recovering the displaced box when possible.
///
/// Returns `None` instead of the previous callback if a clone of it is still
/// executing (the dispatch path holds its own `Arc` while calling).
fn replace_callback<C: ?Sized>(
    slot: &Mutex<Option<Arc<Mutex<Box<C>>>>>,
    callback: Box<C>,
) -> Option<Box<C>> {
    let previous = {
        let mut slot = slot.lock().expect("callback slot mutex poisoned");
        slot.replace(Arc::new(Mutex::new(callback)))
    };
    previous
        .and_then(|shared| Arc::try_unwrap(shared).ok())
        .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
}

/// Builder for [`Connection`] (M-INIT-BUILDER).
///
/// Required inputs are the engine handle and the target URL; everything
/// else defaults: hub-style connection, no query string, no callbacks.
pub struct ConnectionBuilder {
    host: Arc<dyn ScriptHost>,
    url: String,
    kind: ConnectionKind,
    query_string: Option<Value>,
    ready: Option<ReadyHandler>,
    received: Option<DataCallback>,
    lifecycle: Option<LifecycleObserver>,
    unrouted: Option<UnroutedObserver>,
    eval_observer: Option<EvalObserver>,
}

impl std::fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ConnectionBuilder {
    fn new(host: Arc<dyn ScriptHost>, url: String) -> Self {
        Self {
            host,
            url,
            kind: ConnectionKind::Hub,
            query_string: None,
            ready: None,
            received: None,
            lifecycle: None,
            unrouted: None,
            eval_observer: None,
        }
    }

    /// Connection flavor (default: [`ConnectionKind::Hub`]).
    #[must_use]
    pub fn kind(mut self, kind: ConnectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Initial query-string object, assigned during [`build`](Self::build).
    ///
    /// An unencodable value is dropped with a warning.
    #[must_use]
    pub fn query_string<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => self.query_string = Some(json),
            Err(err) => log::warn!("{}: dropping unencodable query string: {err}", self.url),
        }
        self
    }

    /// One-shot ready handler, fired between `initialize` and `start`.
    #[must_use]
    pub fn on_ready(mut self, handler: impl FnOnce(&Connection) + Send + 'static) -> Self {
        self.ready = Some(Box::new(handler));
        self
    }

    /// Generic-data callback.
    #[must_use]
    pub fn on_received(mut self, callback: impl FnMut(&Value) + Send + 'static) -> Self {
        self.received = Some(Box::new(callback));
        self
    }

    /// Transport lifecycle observer.
    #[must_use]
    pub fn on_lifecycle(
        mut self,
        observer: impl FnMut(LifecycleSignal) + Send + 'static,
    ) -> Self {
        self.lifecycle = Some(Box::new(observer));
        self
    }

    /// Unrouted-message observer.
    #[must_use]
    pub fn on_unrouted(
        mut self,
        observer: impl FnMut(&crate::router::Unrouted) + Send + 'static,
    ) -> Self {
        self.unrouted = Some(Box::new(observer));
        self
    }

    /// Outbound evaluation observer.
    #[must_use]
    pub fn on_eval(mut self, observer: impl FnMut(&str, Option<&str>) + Send + 'static) -> Self {
        self.eval_observer = Some(Box::new(observer));
        self
    }

    /// Construct the connection in the `Created` state.
    ///
    /// Returns immediately; the connection is not usable for hub calls until
    /// a routed `ready` envelope arrives. An initial query string set on the
    /// builder is assigned here, before readiness, matching the protocol's
    /// assign-on-set behavior.
    pub fn build(self) -> Connection {
        let outbound = OutboundChannel::new(Arc::clone(&self.host));
        if let Some(observer) = self.eval_observer {
            outbound.set_observer(observer);
        }
        let inbound = InboundChannel::new(self.host);

        let connection = Connection {
            shared: Arc::new(ConnectionShared {
                url: self.url,
                kind: self.kind,
                outbound,
                inbound,
                state: Mutex::new(LifecycleState::Created),
                hubs: Mutex::new(HashMap::new()),
                ready: Mutex::new(self.ready),
                received: Mutex::new(self.received.map(|cb| Arc::new(Mutex::new(cb)))),
                lifecycle: Mutex::new(self.lifecycle.map(|cb| Arc::new(Mutex::new(cb)))),
                unrouted: Mutex::new(self.unrouted.map(|cb| Arc::new(Mutex::new(cb)))),
                query_string: Mutex::new(None),
            }),
        };

        if let Some(value) = self.query_string {
            connection.set_query_string(&value);
        }

        connection
    }
}
