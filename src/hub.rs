//! Hub proxies and their method handler registry.
//!
//! A [`Hub`] is a named group of remotely invocable methods and the host-side
//! callbacks for events the script side forwards back. Hubs are created
//! through [`Connection::create_hub_proxy`](crate::connection::Connection::create_hub_proxy),
//! which guarantees one `Hub` per case-folded name; the handle itself is
//! cheaply cloneable and holds an outbound-channel clone rather than an
//! owning back-reference to its connection.
//!
//! Method handlers are last-write-wins, but replacement is explicit:
//! [`Hub::on`] returns the callback it displaced, so callers (and tests) can
//! observe the swap instead of guessing.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::channel::OutboundChannel;
use crate::protocol::script_literal;

/// Host-side callback for a hub method invocation.
///
/// Receives the invocation's argument list; empty when the wire omitted it.
pub type MethodCallback = Box<dyn FnMut(&[Value]) + Send>;

type SharedCallback = Arc<Mutex<MethodCallback>>;

/// Handle to a named hub proxy.
///
/// `name` keeps the case the caller used; the wire statements use it
/// verbatim, while the connection's registry folds it for lookup.
#[derive(Clone)]
pub struct Hub {
    name: Arc<str>,
    outbound: OutboundChannel,
    handlers: Arc<Mutex<HashMap<String, SharedCallback>>>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handler_count = self.handlers.lock().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("Hub")
            .field("name", &self.name)
            .field("handler_count", &handler_count)
            .finish_non_exhaustive()
    }
}

impl Hub {
    pub(crate) fn new(name: &str, outbound: OutboundChannel) -> Self {
        Self {
            name: Arc::from(name),
            outbound,
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Hub name in its original case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the callback for `method`, replacing any previous one.
    ///
    /// Ensures the script-side proxy exists, stores the callback (method
    /// names match exactly, unlike hub names), and evaluates the wire-level
    /// `addHandler` registration so matching events are forwarded back
    /// through the inbound channel.
    ///
    /// Returns the displaced callback if one was registered. The displaced
    /// callback will never fire again; if the replacement races an in-flight
    /// dispatch of the old callback, that dispatch completes and `None` is
    /// returned instead.
    pub fn on(
        &self,
        method: &str,
        parameter_names: Option<&[String]>,
        callback: impl FnMut(&[Value]) + Send + 'static,
    ) -> Option<MethodCallback> {
        self.outbound.ensure_hub(&self.name);

        let previous = {
            let mut handlers = self.handlers.lock().expect("hub handlers mutex poisoned");
            handlers.insert(
                method.to_string(),
                Arc::new(Mutex::new(Box::new(callback) as MethodCallback)),
            )
        };

        self.outbound.add_handler(&self.name, method, parameter_names);

        previous
            .and_then(|shared| Arc::try_unwrap(shared).ok())
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Invoke `method` on the script-side proxy, fire-and-forget.
    ///
    /// Each argument is encoded as a script literal; an argument that cannot
    /// be encoded is skipped with a warning and the remaining arguments
    /// shift left (no placeholder is substituted). No reply is awaited; any
    /// response arrives later as a `data` or hub invocation envelope.
    pub fn invoke<T: Serialize>(&self, method: &str, arguments: &[T]) {
        self.outbound.ensure_hub(&self.name);

        let mut literals = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match script_literal(argument) {
                Ok(literal) => literals.push(literal),
                Err(err) => {
                    log::warn!("skipping unencodable argument for {}.{method}: {err}", self.name);
                }
            }
        }

        self.outbound.invoke(&self.name, method, &literals);
    }

    /// Dispatch an inbound invocation to the registered callback.
    ///
    /// Returns `false` when no callback is registered for `method`; the
    /// router reports that to the unrouted observer. The handler registry
    /// lock is released before the callback runs, so callbacks may freely
    /// register or replace handlers on this hub.
    pub(crate) fn dispatch(&self, method: &str, arguments: &[Value]) -> bool {
        let callback = {
            let handlers = self.handlers.lock().expect("hub handlers mutex poisoned");
            handlers.get(method).map(Arc::clone)
        };

        match callback {
            Some(callback) => {
                let mut callback = callback.lock().expect("hub callback mutex poisoned");
                callback(arguments);
                true
            }
            None => false,
        }
    }
}
