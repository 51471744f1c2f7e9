//! Outbound channel: fire-and-forget statements into the script context.
//!
//! Every host -> script call the bridge makes goes through
//! [`OutboundChannel::eval`]: connection bootstrap, hub proxy creation,
//! wire-level handler registration, hub invocation, generic sends, and
//! query-string assignment. The statement grammar lives here, next to the
//! single place that evaluates it.
//!
//! Evaluation is synchronous only in the narrow sense that the engine has
//! taken the statement when `eval` returns. No response envelope is expected;
//! any resulting event arrives later through the inbound channel. An optional
//! [`EvalObserver`] gets a completion notification per statement, which is as
//! much acknowledgment as this transport can honestly offer.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex};

use crate::engine::ScriptHost;

/// Completion callback for evaluated statements.
///
/// Invoked after each statement is handed to the engine, with the statement
/// text and the engine's result, in issue order. The observer must not call
/// back into the bridge.
pub type EvalObserver = Box<dyn FnMut(&str, Option<&str>) + Send>;

/// Cloneable handle evaluating statements against the script engine.
///
/// Clones share the engine reference and the observer slot, the same way the
/// hub and connection handles share their registries.
#[derive(Clone)]
pub struct OutboundChannel {
    host: Arc<dyn ScriptHost>,
    observer: Arc<Mutex<Option<Arc<Mutex<EvalObserver>>>>>,
}

impl std::fmt::Debug for OutboundChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let observed = self
            .observer
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("OutboundChannel")
            .field("observed", &observed)
            .finish_non_exhaustive()
    }
}

impl OutboundChannel {
    /// Create a channel evaluating against the given engine.
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host, observer: Arc::new(Mutex::new(None)) }
    }

    /// Install the completion observer, replacing any previous one.
    pub fn set_observer(&self, observer: EvalObserver) {
        let mut slot = self.observer.lock().expect("eval observer mutex poisoned");
        *slot = Some(Arc::new(Mutex::new(observer)));
    }

    /// Remove the completion observer.
    pub fn clear_observer(&self) {
        let mut slot = self.observer.lock().expect("eval observer mutex poisoned");
        *slot = None;
    }

    /// Evaluate a raw statement, returning the engine's result string.
    ///
    /// Fire-and-forget: the return value only reflects what the engine chose
    /// to hand back for this statement, never a protocol reply.
    pub fn eval(&self, statement: &str) -> Option<String> {
        log::debug!("eval: {statement}");
        let result = self.host.eval(statement);

        let observer = {
            let slot = self.observer.lock().expect("eval observer mutex poisoned");
            slot.clone()
        };
        if let Some(observer) = observer {
            let mut observer = observer.lock().expect("eval observer mutex poisoned");
            observer(statement, result.as_deref());
        }

        result
    }

    // ─── Statement builders ────────────────────────────────────────────────
    //
    // Each builder evaluates exactly one statement of the host -> script
    // grammar. String parameters are spliced verbatim, matching the wire
    // behavior the bundled script expects (see protocol module docs for the
    // escaping gap).

    /// Bootstrap the script-side connection object: `initialize(url, isHub)`.
    pub fn initialize(&self, url: &str, is_hub: bool) {
        self.eval(&format!("initialize('{url}',{is_hub})"));
    }

    /// Begin the script-side transport: `start()`.
    pub fn start(&self) {
        self.eval("start()");
    }

    /// Generic payload send: `connection.send(<literal>)`.
    pub fn send_payload(&self, literal: &str) {
        self.eval(&format!("connection.send({literal})"));
    }

    /// Query-string assignment: `connection.qs = <json>`.
    pub fn assign_query_string(&self, json: &str) {
        self.eval(&format!("connection.qs = {json}"));
    }

    /// Guarded hub proxy creation, idempotent on the script side:
    /// `if (typeof <hub> == 'undefined') <hub> = connection.createHubProxy('<hub>')`.
    pub fn ensure_hub(&self, hub: &str) {
        self.eval(&format!(
            "if (typeof {hub} == 'undefined') {hub} = connection.createHubProxy('{hub}')"
        ));
    }

    /// Wire-level handler registration:
    /// `addHandler(<hub>, '<method>', <paramArrayOrNull>)`.
    ///
    /// The parameter-name list is advisory for the script side; `None`
    /// registers with the literal `null`.
    pub fn add_handler(&self, hub: &str, method: &str, parameter_names: Option<&[String]>) {
        let params = match parameter_names {
            Some(names) => {
                let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
                format!("[{}]", quoted.join(","))
            }
            None => crate::protocol::NULL_LITERAL.to_string(),
        };
        self.eval(&format!("addHandler({hub}, '{method}', {params})"));
    }

    /// Remote hub method invocation:
    /// `<hub>.invoke('<method>', arg1, arg2, ...)`.
    ///
    /// Arguments arrive already encoded as script literals; the caller is
    /// responsible for having skipped any that failed to encode.
    pub fn invoke(&self, hub: &str, method: &str, argument_literals: &[String]) {
        self.eval(&format!(
            "{hub}.invoke('{method}', {})",
            argument_literals.join(",")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHost;

    fn channel() -> (Arc<ScriptedHost>, OutboundChannel) {
        let host = Arc::new(ScriptedHost::new());
        let channel = OutboundChannel::new(Arc::clone(&host) as Arc<dyn ScriptHost>);
        (host, channel)
    }

    #[test]
    fn eval_hands_statement_to_engine() {
        let (host, channel) = channel();
        channel.eval("start()");
        assert_eq!(host.statements(), vec!["start()"]);
    }

    #[test]
    fn initialize_statement_shape() {
        let (host, channel) = channel();
        channel.initialize("http://example.com/signalr", true);
        assert_eq!(
            host.statements(),
            vec!["initialize('http://example.com/signalr',true)"]
        );
    }

    #[test]
    fn send_and_query_string_statement_shapes() {
        let (host, channel) = channel();
        channel.send_payload("'hello'");
        channel.assign_query_string(r#"{"token":"abc"}"#);
        assert_eq!(
            host.statements(),
            vec!["connection.send('hello')", r#"connection.qs = {"token":"abc"}"#]
        );
    }

    #[test]
    fn ensure_hub_is_guarded() {
        let (host, channel) = channel();
        channel.ensure_hub("chat");
        assert_eq!(
            host.statements(),
            vec!["if (typeof chat == 'undefined') chat = connection.createHubProxy('chat')"]
        );
    }

    #[test]
    fn add_handler_with_and_without_parameter_names() {
        let (host, channel) = channel();
        channel.add_handler("chat", "newMessage", Some(&["user".into(), "text".into()]));
        channel.add_handler("chat", "ping", None);
        assert_eq!(
            host.statements(),
            vec![
                "addHandler(chat, 'newMessage', ['user','text'])",
                "addHandler(chat, 'ping', null)",
            ]
        );
    }

    #[test]
    fn invoke_joins_encoded_arguments() {
        let (host, channel) = channel();
        channel.invoke("chat", "send", &["'hi'".into(), "42".into()]);
        channel.invoke("chat", "refresh", &[]);
        assert_eq!(
            host.statements(),
            vec!["chat.invoke('send', 'hi',42)", "chat.invoke('refresh', )"]
        );
    }

    #[test]
    fn observer_sees_statements_in_issue_order() {
        let (_host, channel) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.set_observer(Box::new(move |statement, _result| {
            sink.lock().unwrap().push(statement.to_string());
        }));

        channel.start();
        channel.send_payload("1");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start()".to_string(), "connection.send(1)".to_string()]
        );
    }

    #[test]
    fn observer_receives_engine_result() {
        let (host, channel) = channel();
        host.respond("start()", "ok");
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        channel.set_observer(Box::new(move |_statement, result| {
            sink.lock().unwrap().push(result.map(str::to_string));
        }));

        channel.start();
        channel.eval("unanswered()");

        assert_eq!(*results.lock().unwrap(), vec![Some("ok".to_string()), None]);
    }

    #[test]
    fn cleared_observer_stops_firing() {
        let (_host, channel) = channel();
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        channel.set_observer(Box::new(move |_, _| *sink.lock().unwrap() += 1));

        channel.start();
        channel.clear_observer();
        channel.start();

        assert_eq!(*count.lock().unwrap(), 1);
    }
}
