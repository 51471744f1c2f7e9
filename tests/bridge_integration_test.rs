//! End-to-end bridge tests: connect, simulate script-side traffic through
//! the navigation interception point, and observe host-side dispatch.
//!
//! The engine double stands in for the script context; everything else is
//! the real bridge.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use hubview::testing::ScriptedHost;
use hubview::{
    Connection, ConnectionKind, ConnectionRegistry, LifecycleSignal, LifecycleState,
    NavigationPolicy, Unrouted, RESERVED_SCHEME,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a reserved-scheme navigation target carrying `envelope` the way the
/// script bundle would: JSON text, percent-encoded, behind the scheme.
fn inbound(envelope: &str) -> String {
    format!("{RESERVED_SCHEME}{}", ScriptedHost::percent_encode(envelope))
}

#[test]
fn connect_ready_register_invoke_round_trip() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let registry = ConnectionRegistry::new();
    let received: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let connection = registry.connect(
        engine.clone(),
        "http://x/signalr",
        ConnectionKind::Hub,
        move |conn: &Connection| {
            let chat = conn.create_hub_proxy("chat");
            let sink = Arc::clone(&sink);
            chat.on("send", None, move |args| {
                sink.lock().unwrap().push(args.to_vec());
            });
        },
    );

    // Script bundle loads and signals readiness.
    assert_eq!(
        connection.handle_navigation(&inbound(r#"{"message":"ready"}"#)),
        NavigationPolicy::Suppress
    );
    assert_eq!(connection.state(), LifecycleState::Ready);

    // A remote invocation for the registered hub method reaches the callback.
    connection.handle_navigation(&inbound(r#"{"hub":"chat","method":"send","arguments":["hi"]}"#));
    assert_eq!(*received.lock().unwrap(), vec![vec![json!("hi")]]);
}

#[test]
fn ready_bootstrap_orders_initialize_handler_start() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine.clone(), "http://x/signalr")
        .on_ready(|conn: &Connection| {
            let chat = conn.create_hub_proxy("chat");
            chat.on("send", None, |_| {});
        })
        .build();

    connection.handle_navigation(&inbound(r#"{"message":"ready"}"#));

    let statements = engine.statements();
    let position = |needle: &str| {
        statements
            .iter()
            .position(|s| s.starts_with(needle))
            .unwrap_or_else(|| panic!("no statement starting with {needle:?} in {statements:?}"))
    };

    // initialize strictly before the handler's registrations, which are
    // strictly before start: the handler must get its hub handlers in place
    // before the connection begins transmitting.
    assert!(position("initialize(") < position("if (typeof chat"));
    assert!(position("addHandler(chat, 'send'") < position("start()"));
    assert_eq!(statements[0], "decodeURIComponent('%7B%22message%22%3A%22ready%22%7D')");
}

#[test]
fn hub_routing_is_case_insensitive_but_wire_case_is_preserved() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine.clone(), "http://x/signalr").build();
    let hits = Arc::new(Mutex::new(0usize));

    let chat = connection.create_hub_proxy("Chat");
    let sink = Arc::clone(&hits);
    chat.on("send", None, move |_| *sink.lock().unwrap() += 1);

    // The wire carries the original casing.
    assert!(engine
        .statements()
        .iter()
        .any(|s| s == "addHandler(Chat, 'send', null)"));

    // Routing folds case: the server's lower-cased hub name still dispatches.
    connection.handle_navigation(&inbound(r#"{"hub":"chat","method":"send"}"#));
    connection.handle_navigation(&inbound(r#"{"hub":"Chat","method":"send"}"#));
    assert_eq!(*hits.lock().unwrap(), 2);
}

#[test]
fn handler_replacement_is_total() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine, "http://x/signalr").build();
    let old_hits = Arc::new(Mutex::new(0usize));
    let new_hits = Arc::new(Mutex::new(0usize));

    let chat = connection.create_hub_proxy("chat");
    let sink = Arc::clone(&old_hits);
    assert!(chat.on("send", None, move |_| *sink.lock().unwrap() += 1).is_none());
    let sink = Arc::clone(&new_hits);
    let displaced = chat.on("send", None, move |_| *sink.lock().unwrap() += 1);
    assert!(displaced.is_some());

    connection.handle_navigation(&inbound(r#"{"hub":"chat","method":"send"}"#));

    assert_eq!(*old_hits.lock().unwrap(), 0, "displaced handler must never fire");
    assert_eq!(*new_hits.lock().unwrap(), 1);
}

#[test]
fn lifecycle_precedence_and_observer_ordering() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let signals = Arc::new(Mutex::new(Vec::new()));
    let payloads = Arc::new(Mutex::new(Vec::new()));

    let signal_sink = Arc::clone(&signals);
    let payload_sink = Arc::clone(&payloads);
    let connection = Connection::builder(engine, "http://x/signalr")
        .on_lifecycle(move |signal| signal_sink.lock().unwrap().push(signal))
        .on_received(move |value: &Value| payload_sink.lock().unwrap().push(value.clone()))
        .build();

    // Both keys present: the envelope is a lifecycle signal, not data.
    connection.handle_navigation(&inbound(r#"{"message":"connected","data":{"x":1}}"#));
    connection.handle_navigation(&inbound(r#"{"data":{"x":2}}"#));
    connection.handle_navigation(&inbound(r#"{"message":"disconnected"}"#));

    assert_eq!(
        *signals.lock().unwrap(),
        vec![LifecycleSignal::Connected, LifecycleSignal::Disconnected]
    );
    assert_eq!(*payloads.lock().unwrap(), vec![json!({"x": 2})]);
    assert_eq!(connection.state(), LifecycleState::Disconnected);
}

#[test]
fn unknown_routes_drop_silently_but_are_observable() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine, "http://x/signalr").build();
    connection.create_hub_proxy("chat");

    // Without an observer: no panic, no callback, nothing.
    assert_eq!(
        connection.handle_navigation(&inbound(r#"{"hub":"ghost","method":"boo"}"#)),
        NavigationPolicy::Suppress
    );

    let dropped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&dropped);
    connection.on_unrouted(move |unrouted: &Unrouted| sink.lock().unwrap().push(unrouted.clone()));

    connection.handle_navigation(&inbound(r#"{"hub":"ghost","method":"boo"}"#));
    connection.handle_navigation(&inbound(r#"{"hub":"chat","method":"missing"}"#));

    let dropped = dropped.lock().unwrap();
    assert!(matches!(&dropped[0], Unrouted::UnknownHub { hub, .. } if hub == "ghost"));
    assert!(matches!(&dropped[1], Unrouted::UnknownMethod { method, .. } if method == "missing"));
}

#[test]
fn malformed_inbound_traffic_never_escapes_the_bridge() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine, "http://x/signalr").build();

    for garbage in [
        "{not json",
        "[]",
        "{}",
        r#"{"message":"rebooting"}"#,
        r#"{"hub":"chat"}"#,
    ] {
        assert_eq!(
            connection.handle_navigation(&inbound(garbage)),
            NavigationPolicy::Suppress,
            "bridge traffic is suppressed even when undecodable: {garbage}"
        );
    }
    assert_eq!(connection.state(), LifecycleState::Created);
}

#[test]
fn eval_observer_acknowledges_fire_and_forget_traffic() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let connection = Connection::builder(engine, "http://x/signalr")
        .on_eval(move |statement, _result| sink.lock().unwrap().push(statement.to_string()))
        .build();

    connection.send("ping");
    connection.set_query_string(&json!({"v": 3}));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "connection.send('ping')".to_string(),
            r#"connection.qs = {"v":3}"#.to_string(),
        ]
    );
}

#[test]
fn registry_tracks_and_releases_connections() {
    init_logging();
    let registry = ConnectionRegistry::new();
    let engine = Arc::new(ScriptedHost::new());

    registry.connect(engine.clone(), "http://x/signalr", ConnectionKind::Hub, |_| {});
    registry.connect(engine.clone(), "http://y/echo", ConnectionKind::Persistent, |_| {});
    assert_eq!(registry.len(), 2);

    let removed = registry.remove("http://x/signalr").expect("registered above");
    assert_eq!(removed.url(), "http://x/signalr");
    assert_eq!(registry.urls(), vec!["http://y/echo"]);

    // The detached connection still works; it is just no longer enumerated.
    removed.handle_navigation(&inbound(r#"{"message":"ready"}"#));
    assert_eq!(removed.state(), LifecycleState::Ready);
}

#[test]
fn quoted_string_arguments_document_the_escaping_gap() {
    init_logging();
    let engine = Arc::new(ScriptedHost::new());
    let connection = Connection::builder(engine.clone(), "http://x/signalr").build();
    let chat = connection.create_hub_proxy("chat");

    chat.invoke("send", &["it's fine"]);

    // Known gap preserved from the wire protocol: the embedded quote is not
    // escaped, so this statement is broken script. Pinned so a future fix is
    // a deliberate behavior change.
    assert!(engine
        .statements()
        .iter()
        .any(|s| s == "chat.invoke('send', 'it's fine')"));
}
