//! Explicit store of active connections.
//!
//! There is no process-wide connection list anywhere in the crate. The
//! registry is a value the application's top-level context owns: add,
//! remove, enumerate, and look up connections by their identity (the target
//! URL).

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex};

use crate::connection::{Connection, ConnectionKind};
use crate::engine::ScriptHost;

/// Owned set of active connections, keyed by target URL.
///
/// One URL maps to at most one connection; adding a connection for a URL
/// that is already present displaces the old one (and hands it back, so the
/// caller can tear it down).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<Vec<Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, register, and return a connection in one step.
    ///
    /// Returns immediately: script loading is asynchronous, so the returned
    /// connection is not usable for hub calls until its `ready` envelope has
    /// been routed. The ready handler is the place to register hubs.
    pub fn connect(
        &self,
        host: Arc<dyn ScriptHost>,
        url: impl Into<String>,
        kind: ConnectionKind,
        ready: impl FnOnce(&Connection) + Send + 'static,
    ) -> Connection {
        let connection = Connection::builder(host, url).kind(kind).on_ready(ready).build();
        if let Some(displaced) = self.add(connection.clone()) {
            log::warn!("replacing existing connection for {}", displaced.url());
        }
        connection
    }

    /// Register a connection, displacing any existing one with the same URL.
    pub fn add(&self, connection: Connection) -> Option<Connection> {
        let mut connections = self.connections.lock().expect("connection registry mutex poisoned");
        let displaced = connections
            .iter()
            .position(|existing| existing.url() == connection.url())
            .map(|index| connections.remove(index));
        connections.push(connection);
        displaced
    }

    /// Remove and return the connection for `url`, if registered.
    pub fn remove(&self, url: &str) -> Option<Connection> {
        let mut connections = self.connections.lock().expect("connection registry mutex poisoned");
        connections
            .iter()
            .position(|existing| existing.url() == url)
            .map(|index| connections.remove(index))
    }

    /// Look up the connection for `url`.
    pub fn get(&self, url: &str) -> Option<Connection> {
        let connections = self.connections.lock().expect("connection registry mutex poisoned");
        connections.iter().find(|existing| existing.url() == url).cloned()
    }

    /// URLs of all registered connections, in registration order.
    pub fn urls(&self) -> Vec<String> {
        let connections = self.connections.lock().expect("connection registry mutex poisoned");
        connections.iter().map(|c| c.url().to_string()).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.lock().expect("connection registry mutex poisoned").len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
