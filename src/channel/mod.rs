//! Asymmetric transport channels between host and script context.
//!
//! The two directions are deliberately different shapes:
//!
//! ```text
//! host -> script   OutboundChannel   evaluate-and-discard statements
//! script -> host   InboundChannel    intercepted pseudo-navigations
//! ```
//!
//! Outbound calls are fire-and-forget: a statement is handed to the engine
//! and no correlated reply is ever awaited. Anything the script wants the
//! host to know arrives later, as a reserved-scheme navigation attempt that
//! the inbound channel decodes and suppresses. Neither direction blocks on
//! the other.

// Rust guideline compliant 2026-02

pub mod inbound;
pub mod outbound;

pub use inbound::{InboundChannel, InboundError, Intercept, RESERVED_SCHEME};
pub use outbound::{EvalObserver, OutboundChannel};
