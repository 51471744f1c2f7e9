//! Hubview - bridge and multiplexer between a host process and an embedded
//! script execution context.
//!
//! The script context (typically a hidden web view running a bundled
//! connection script) shares no memory and no synchronous call path with the
//! host. This crate provides the bridge across that gap: the host pushes
//! commands in as evaluated statements, and receives notifications and
//! remote-procedure invocations back as intercepted pseudo-navigations, all
//! JSON-encoded, order-preserving, and non-blocking in both directions.
//!
//! # Architecture
//!
//! ```text
//! Connection (state machine, public surface)
//!     ├── OutboundChannel ──▶ ScriptHost::eval   fire-and-forget statements
//!     ├── InboundChannel  ◀── handle_navigation  reserved-scheme intercept
//!     ├── router                                  envelope dispatch
//!     └── hub registry ──▶ Hub ──▶ method callbacks
//! ConnectionRegistry                              owned set of connections
//! ```
//!
//! The underlying real-time transport (reconnection, negotiation) lives
//! entirely in the embedded script library; this crate is a bridge and
//! multiplexer, not a transport.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use hubview::{ConnectionKind, ConnectionRegistry};
//! use hubview::testing::ScriptedHost;
//!
//! let engine = Arc::new(ScriptedHost::new());
//! let registry = ConnectionRegistry::new();
//!
//! let connection = registry.connect(
//!     engine.clone(),
//!     "http://example.com/signalr",
//!     ConnectionKind::Hub,
//!     |conn| {
//!         // Runs between initialize() and start(): register hubs here.
//!         let chat = conn.create_hub_proxy("chat");
//!         chat.on("newMessage", None, |args| {
//!             println!("message: {args:?}");
//!         });
//!     },
//! );
//!
//! // The host's navigation layer feeds every script-emitted request in:
//! let encoded = ScriptedHost::percent_encode(r#"{"message":"ready"}"#);
//! connection.handle_navigation(&format!("hubview://{encoded}"));
//! ```

// Rust guideline compliant 2026-02

pub mod channel;
pub mod connection;
pub mod engine;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod testing;

// Re-export the host-facing surface.
pub use channel::{
    EvalObserver, InboundChannel, InboundError, Intercept, OutboundChannel, RESERVED_SCHEME,
};
pub use connection::{
    Connection, ConnectionBuilder, ConnectionKind, LifecycleState, NavigationPolicy,
};
pub use engine::ScriptHost;
pub use hub::Hub;
pub use protocol::{DecodeError, Envelope, LifecycleSignal};
pub use registry::ConnectionRegistry;
pub use router::Unrouted;
