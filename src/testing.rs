//! Test doubles for the script engine seam.
//!
//! Provides [`ScriptedHost`], an in-memory [`ScriptHost`] that records every
//! evaluated statement and answers the percent-decode round trip the inbound
//! channel performs, so bridge behavior can be exercised without any real
//! script engine. Shared by the unit tests and the `tests/` suite.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hubview::testing::ScriptedHost;
//! use hubview::{Connection, ConnectionKind};
//!
//! let host = Arc::new(ScriptedHost::new());
//! let connection = Connection::builder(host.clone(), "http://example.com/signalr")
//!     .kind(ConnectionKind::Hub)
//!     .build();
//! connection.send(&serde_json::json!({"ping": 1}));
//! assert_eq!(host.statements(), vec![r#"connection.send({"ping":1})"#]);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use crate::engine::ScriptHost;

/// Recording engine double.
///
/// Every statement handed to [`ScriptHost::eval`] is recorded in order.
/// Results are produced from three sources, first match wins:
///
/// 1. muted: always `None` (simulates a dead engine),
/// 2. a canned response registered via [`respond`](Self::respond),
/// 3. `decodeURIComponent('<raw>')` statements, answered by an actual
///    percent-decode of `<raw>` (the double stands in for the engine's
///    decoder so inbound traffic can be simulated end to end).
///
/// Everything else evaluates to `None`, like a statement whose result the
/// engine discards.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    statements: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, String>>,
    muted: Mutex<bool>,
}

impl ScriptedHost {
    /// Create an empty recording host.
    pub fn new() -> Self {
        Self::default()
    }

    /// All statements evaluated so far, in issue order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().expect("statements mutex poisoned").clone()
    }

    /// Forget recorded statements (canned responses are kept).
    pub fn clear(&self) {
        self.statements.lock().expect("statements mutex poisoned").clear();
    }

    /// Register a canned result for an exact statement.
    pub fn respond(&self, statement: &str, result: &str) {
        self.responses
            .lock()
            .expect("responses mutex poisoned")
            .insert(statement.to_string(), result.to_string());
    }

    /// Stop producing results entirely, simulating a dead engine.
    ///
    /// Statements are still recorded.
    pub fn mute(&self) {
        *self.muted.lock().expect("muted mutex poisoned") = true;
    }

    /// Percent-encode text the way the script bundle would before embedding
    /// it in a reserved-scheme navigation. Convenience for building inbound
    /// targets in tests.
    pub fn percent_encode(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for byte in text.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char);
                }
                _ => out.push_str(&format!("%{byte:02X}")),
            }
        }
        out
    }
}

impl ScriptHost for ScriptedHost {
    fn eval(&self, statement: &str) -> Option<String> {
        self.statements
            .lock()
            .expect("statements mutex poisoned")
            .push(statement.to_string());

        if *self.muted.lock().expect("muted mutex poisoned") {
            return None;
        }

        if let Some(result) = self
            .responses
            .lock()
            .expect("responses mutex poisoned")
            .get(statement)
        {
            return Some(result.clone());
        }

        statement
            .strip_prefix("decodeURIComponent('")
            .and_then(|rest| rest.strip_suffix("')"))
            .and_then(percent_decode)
    }
}

/// Decode `%XX` escapes the way `decodeURIComponent` does.
///
/// Returns `None` for truncated escapes or invalid UTF-8, which the inbound
/// channel treats as a dead round trip.
fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
