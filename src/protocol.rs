//! Envelope codec: wire JSON in, script literals out.
//!
//! Script -> host traffic arrives as JSON text (the percent-decoded remainder
//! of a reserved-scheme pseudo-navigation). [`Envelope::decode`] parses that
//! text once, at the boundary, into an explicit tagged union. The wire shape
//! is a JSON object discriminated by key presence, in this precedence order:
//!
//! ```text
//! {"message": "ready" | "connected" | "disconnected"}   lifecycle signal
//! {"data": <any JSON value>}                            generic payload
//! {"hub": "...", "method": "...", "arguments": [...]}   hub invocation
//! ```
//!
//! Exactly one interpretation applies per envelope; when several keys are
//! present, `message` wins, then `data`, then `hub`.
//!
//! Host -> script traffic is embedded into evaluated statements as literals
//! via [`script_literal`]. Strings are wrapped in single quotes verbatim,
//! with no escaping. That is the wire behavior the script bundle expects and
//! it is preserved as-is: a string argument containing a quote character will
//! produce a broken statement. Callers that control their payloads never hit
//! it; the tests in this module pin the behavior down.

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle signal carried in a `message` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Script bundle is loaded and the connection object can be initialized.
    Ready,
    /// Underlying transport reports connected.
    Connected,
    /// Underlying transport reports disconnected.
    Disconnected,
}

impl LifecycleSignal {
    /// Parse the wire string, `None` for anything unrecognized.
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// The wire string for this signal.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded script -> host message.
///
/// Decoded exactly once at the inbound boundary; everything downstream
/// matches on the variant instead of re-inspecting JSON keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Connection lifecycle signal.
    Lifecycle(LifecycleSignal),
    /// Generic payload for the connection-level data callback.
    Data(Value),
    /// Remote invocation of a registered hub method handler.
    Invocation {
        /// Hub name as sent on the wire (routing folds case; this does not).
        hub: String,
        /// Method name, matched exactly.
        method: String,
        /// Invocation arguments. Empty when the wire omitted them.
        arguments: Vec<Value>,
    },
}

/// Raw wire shape of an envelope, before classification.
///
/// All fields optional; which ones are present decides the variant.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    hub: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
}

/// A message that could not be decoded into an [`Envelope`].
///
/// The router treats every variant the same way: log and drop. No decode
/// failure is ever surfaced to the host as a panic or a result failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The text was not valid JSON, or not a JSON object.
    Malformed(String),
    /// The `message` key held something other than a known lifecycle string.
    UnknownLifecycle(String),
    /// A `hub` key arrived without a `method` key.
    MissingMethod {
        /// Hub name from the partial envelope, for the log line.
        hub: String,
    },
    /// None of `message`, `data`, `hub` were present.
    UnroutableShape,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed envelope: {msg}"),
            Self::UnknownLifecycle(s) => write!(f, "unknown lifecycle signal: {s:?}"),
            Self::MissingMethod { hub } => {
                write!(f, "hub invocation for {hub:?} is missing a method")
            }
            Self::UnroutableShape => write!(f, "envelope has no message, data, or hub key"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl Envelope {
    /// Decode wire JSON text into an envelope.
    ///
    /// Classification follows key presence with the documented precedence:
    /// `message`, then `data`, then `hub`. A `data` key holding JSON `null`
    /// does not claim the envelope (absent and null are indistinguishable on
    /// this wire), so `{"data": null, "hub": ...}` routes as an invocation.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed JSON, an unknown or non-string
    /// `message` value, a `hub` key without a `method`, or an object with
    /// none of the three discriminating keys.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: RawEnvelope =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        if let Some(message) = raw.message {
            let signal = message
                .as_str()
                .and_then(LifecycleSignal::parse)
                .ok_or_else(|| DecodeError::UnknownLifecycle(message.to_string()))?;
            return Ok(Self::Lifecycle(signal));
        }

        if let Some(data) = raw.data {
            return Ok(Self::Data(data));
        }

        if let Some(hub) = raw.hub {
            let method = raw
                .method
                .ok_or_else(|| DecodeError::MissingMethod { hub: hub.clone() })?;
            return Ok(Self::Invocation {
                hub,
                method,
                arguments: arguments_vec(raw.arguments),
            });
        }

        Err(DecodeError::UnroutableShape)
    }
}

/// Normalize the optional `arguments` value into an argument list.
///
/// A non-array value becomes a single-element list so a sloppy sender still
/// reaches its handler.
fn arguments_vec(arguments: Option<Value>) -> Vec<Value> {
    match arguments {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}

/// A host value that could not be encoded for the wire.
#[derive(Debug, Clone)]
pub struct EncodeError(String);

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value cannot be encoded as a script literal: {}", self.0)
    }
}

impl std::error::Error for EncodeError {}

/// The literal the encoder falls back to for absent or unencodable payloads.
pub const NULL_LITERAL: &str = "null";

/// Encode a host value as a literal for embedding in a script statement.
///
/// Strings become `'<contents>'` with the contents verbatim (single quotes,
/// no escaping - see the module docs); every other serializable value is
/// JSON-serialized; a unit/absent value encodes as the literal `null`.
///
/// # Errors
///
/// Returns [`EncodeError`] when serde cannot represent the value as JSON
/// (for example a map with non-string keys). Callers decide the fallback:
/// `send` substitutes [`NULL_LITERAL`], `invoke` skips the argument.
pub fn script_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodeError> {
    let json = serde_json::to_value(value).map_err(|e| EncodeError(e.to_string()))?;
    Ok(match json {
        Value::Null => NULL_LITERAL.to_string(),
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    })
}
