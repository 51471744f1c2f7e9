//! Script engine seam.
//!
//! The embedded script context (a web view, an interpreter, anything that can
//! run the bundled connection script) is an external collaborator. The bridge
//! only ever asks two things of it: evaluate a statement and hand back the
//! result string, and deliver script-emitted pseudo-navigations to
//! [`Connection::handle_navigation`](crate::connection::Connection::handle_navigation).
//! This module defines the first seam; the second is plain method dispatch on
//! the connection and needs no trait.

// Rust guideline compliant 2026-02

/// Host-side handle to the embedded script engine.
///
/// Implementations wrap whatever "evaluate script, get result" primitive the
/// host environment provides. The call is synchronous from the caller's point
/// of view (it returns once the engine has taken the statement), but it makes
/// no promise about script-side asynchronous work that the statement kicks
/// off. See [`OutboundChannel`](crate::channel::OutboundChannel) for the
/// fire-and-forget contract built on top of this.
///
/// `Send + Sync` is required so connection handles stay cloneable across
/// threads even though the bridge itself runs on one control thread.
pub trait ScriptHost: Send + Sync {
    /// Evaluate a script statement in the embedded context.
    ///
    /// Returns the engine's result string, or `None` when the engine produced
    /// no result (including engine-side evaluation errors, which the bridge
    /// never surfaces).
    fn eval(&self, statement: &str) -> Option<String>;
}
