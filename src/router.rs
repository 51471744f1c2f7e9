//! Message router: envelope classification to handler dispatch.
//!
//! Every decoded inbound envelope funnels through [`Connection::route`]:
//!
//! - `ready` runs the fixed bootstrap sequence: evaluate `initialize`, fire
//!   the ready handler, evaluate `start`. The ordering is load-bearing, the
//!   ready handler registers hub handlers before the connection starts
//!   transmitting.
//! - `connected` / `disconnected` transition the state machine and surface as
//!   lifecycle notifications.
//! - generic `data` goes to the connection's data callback.
//! - hub invocations resolve hub (case-folded) then method (exact case) and
//!   call the registered callback.
//!
//! Routing misses are never errors: the message is dropped, logged at warn,
//! and reported to the optional unrouted observer. Silent-drop is the
//! transport's historical contract; the observer makes it visible without
//! changing the default.

// Rust guideline compliant 2026-02

use serde_json::Value;

use crate::connection::{Connection, ConnectionKind, LifecycleState};
use crate::protocol::{Envelope, LifecycleSignal};

/// A message that reached the router but had no registered destination.
///
/// Handed to the observer installed with
/// [`Connection::on_unrouted`](crate::connection::Connection::on_unrouted).
#[derive(Debug, Clone, PartialEq)]
pub enum Unrouted {
    /// No hub registered under the envelope's (case-folded) hub name.
    UnknownHub {
        /// Hub name as sent on the wire.
        hub: String,
        /// Method that would have been dispatched.
        method: String,
        /// Arguments that would have been delivered.
        arguments: Vec<Value>,
    },
    /// The hub exists but has no callback for the method.
    UnknownMethod {
        /// Hub name as sent on the wire.
        hub: String,
        /// Method with no registered callback.
        method: String,
        /// Arguments that would have been delivered.
        arguments: Vec<Value>,
    },
    /// A `data` envelope arrived with no data callback registered.
    UnhandledData(Value),
}

/// Observer for dropped messages. Default when absent: silent drop.
pub type UnroutedObserver = Box<dyn FnMut(&Unrouted) + Send>;

impl Connection {
    /// Dispatch a decoded envelope.
    ///
    /// No registry lock is held while a user callback runs; callbacks may
    /// freely create hubs, register handlers, or send.
    pub(crate) fn route(&self, envelope: Envelope) {
        match envelope {
            Envelope::Lifecycle(signal) => self.route_lifecycle(signal),
            Envelope::Data(value) => self.route_data(value),
            Envelope::Invocation { hub, method, arguments } => {
                self.route_invocation(hub, method, arguments);
            }
        }
    }

    fn route_lifecycle(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Ready => self.route_ready(),
            LifecycleSignal::Connected => self.route_transport_state(signal, LifecycleState::Connected),
            LifecycleSignal::Disconnected => {
                self.route_transport_state(signal, LifecycleState::Disconnected);
            }
        }
    }

    /// Fixed bootstrap sequence, run once per connection.
    fn route_ready(&self) {
        {
            let mut state = self.shared.state.lock().expect("connection state mutex poisoned");
            if *state != LifecycleState::Created {
                log::debug!("{}: repeated ready signal ignored", self.url());
                return;
            }
            *state = LifecycleState::Ready;
        }

        let is_hub = self.kind() == ConnectionKind::Hub;
        self.shared.outbound.initialize(self.url(), is_hub);

        let handler = {
            let mut slot = self.shared.ready.lock().expect("ready handler mutex poisoned");
            slot.take()
        };
        if let Some(handler) = handler {
            handler(self);
        }

        self.shared.outbound.start();
    }

    fn route_transport_state(&self, signal: LifecycleSignal, next: LifecycleState) {
        {
            let mut state = self.shared.state.lock().expect("connection state mutex poisoned");
            *state = next;
        }
        log::info!("{}: {signal}", self.url());

        let observer = {
            let slot = self.shared.lifecycle.lock().expect("lifecycle observer mutex poisoned");
            slot.clone()
        };
        if let Some(observer) = observer {
            let mut observer = observer.lock().expect("lifecycle observer mutex poisoned");
            observer(signal);
        }
    }

    fn route_data(&self, value: Value) {
        let callback = {
            let slot = self.shared.received.lock().expect("data callback mutex poisoned");
            slot.clone()
        };
        match callback {
            Some(callback) => {
                let mut callback = callback.lock().expect("data callback mutex poisoned");
                callback(&value);
            }
            None => self.report_unrouted(Unrouted::UnhandledData(value)),
        }
    }

    fn route_invocation(&self, hub: String, method: String, arguments: Vec<Value>) {
        let target = {
            let hubs = self.shared.hubs.lock().expect("hub registry mutex poisoned");
            hubs.get(&hub.to_lowercase()).cloned()
        };

        match target {
            Some(target) => {
                if !target.dispatch(&method, &arguments) {
                    self.report_unrouted(Unrouted::UnknownMethod { hub, method, arguments });
                }
            }
            None => self.report_unrouted(Unrouted::UnknownHub { hub, method, arguments }),
        }
    }

    fn report_unrouted(&self, unrouted: Unrouted) {
        match &unrouted {
            Unrouted::UnknownHub { hub, method, .. } => {
                log::warn!("{}: dropping invocation for unknown hub {hub:?} ({method})", self.url());
            }
            Unrouted::UnknownMethod { hub, method, .. } => {
                log::warn!("{}: hub {hub:?} has no handler for {method:?}", self.url());
            }
            Unrouted::UnhandledData(_) => {
                log::debug!("{}: data envelope with no callback registered", self.url());
            }
        }

        let observer = {
            let slot = self.shared.unrouted.lock().expect("unrouted observer mutex poisoned");
            slot.clone()
        };
        if let Some(observer) = observer {
            let mut observer = observer.lock().expect("unrouted observer mutex poisoned");
            observer(&unrouted);
        }
    }
}
