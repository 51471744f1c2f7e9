//! Inbound channel: reserved-scheme navigation interception.
//!
//! The script context has no direct call path into the host. To signal the
//! host, the bundled script encodes an envelope as JSON, percent-encodes it,
//! and attempts a navigation to `hubview://<encoded>`. The host's navigation
//! layer hands every outgoing request here; this channel claims the ones that
//! match the reserved scheme, decodes them, and tells the caller to suppress
//! the navigation. Everything else passes through untouched.
//!
//! The percent-decoding deliberately round-trips through the engine's own
//! `decodeURIComponent`, so decoding is symmetric with whatever encoder the
//! script bundle used. The "request" is transport-shaped but purely a one-way
//! notification: it is never allowed to complete.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use crate::engine::ScriptHost;
use crate::protocol::{DecodeError, Envelope};

/// Scheme prefix reserved for script -> host signaling.
pub const RESERVED_SCHEME: &str = "hubview://";

/// Outcome of offering a navigation target to the inbound channel.
#[derive(Debug)]
pub enum Intercept {
    /// Not bridge traffic; the navigation should proceed normally.
    Pass,
    /// Bridge traffic, decoded; the navigation must be suppressed.
    Handled(Envelope),
    /// Bridge traffic that failed to decode; the navigation must still be
    /// suppressed (the scheme matched), the message is dropped.
    Dropped(InboundError),
}

/// Why a reserved-scheme message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    /// The engine returned no result for the percent-decode round trip.
    DecodeRoundTrip,
    /// The decoded text was not a valid envelope.
    Envelope(DecodeError),
}

impl std::fmt::Display for InboundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecodeRoundTrip => write!(f, "engine percent-decode returned no result"),
            Self::Envelope(err) => write!(f, "undecodable envelope: {err}"),
        }
    }
}

impl std::error::Error for InboundError {}

/// Interceptor for script-emitted pseudo-navigations.
#[derive(Clone)]
pub struct InboundChannel {
    host: Arc<dyn ScriptHost>,
}

impl std::fmt::Debug for InboundChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundChannel").finish_non_exhaustive()
    }
}

impl InboundChannel {
    /// Create an interceptor that decodes via the given engine.
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }

    /// Offer a navigation target to the channel.
    ///
    /// Targets without the reserved scheme return [`Intercept::Pass`] and are
    /// otherwise ignored. Matching targets are stripped, percent-decoded via
    /// the engine, and parsed into an [`Envelope`]; both success and decode
    /// failure suppress the navigation.
    pub fn intercept(&self, target: &str) -> Intercept {
        let Some(encoded) = target.strip_prefix(RESERVED_SCHEME) else {
            return Intercept::Pass;
        };

        let Some(text) = self.host.eval(&format!("decodeURIComponent('{encoded}')")) else {
            return Intercept::Dropped(InboundError::DecodeRoundTrip);
        };

        match Envelope::decode(&text) {
            Ok(envelope) => Intercept::Handled(envelope),
            Err(err) => Intercept::Dropped(InboundError::Envelope(err)),
        }
    }
}
