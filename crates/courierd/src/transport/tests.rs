//! Unit tests for the line connector.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use rstest::rstest;
use serde_json::{Value, json};

use super::*;

type TestConnector = LineConnector<Cursor<Vec<u8>>, Vec<u8>>;

fn connector_reading(input: impl AsRef<[u8]>) -> TestConnector {
    LineConnector::new(Cursor::new(input.as_ref().to_vec()), Vec::new())
}

fn recording_callback() -> (MessageCallback, Arc<Mutex<Vec<ParsedChunks>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: MessageCallback =
        Box::new(move |chunks: &ParsedChunks, _sender: &dyn ResponseSender| {
            sink.lock().expect("lock").push(chunks.clone());
        });
    (callback, seen)
}

fn reply(to: &ParsedChunks) -> OutboundMessage {
    let mut data = Payload::new();
    data.insert("ok".into(), Value::Bool(true));
    let mut debug = Payload::new();
    debug.insert("debug_data".into(), json!("hop-1"));
    OutboundMessage {
        recipients: vec![to.sender().to_owned()],
        schema: RESPONSE_SCHEMA.to_owned(),
        timeout_secs: 10,
        in_reply_to: to.id().to_owned(),
        data,
        debug: vec![debug],
    }
}

fn written_lines(connector: TestConnector) -> Vec<Value> {
    let output = connector.into_writer().expect("writer");
    String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response line is JSON"))
        .collect()
}

#[test]
fn connect_requires_a_callback() {
    let mut connector = connector_reading("");
    let error = connector.connect().expect_err("connect must fail");
    assert!(matches!(error, ConnectionError::Configuration { .. }));
    assert!(!connector.is_connected());
}

#[test]
fn monitor_requires_connection() {
    let mut connector = connector_reading("");
    let (callback, _) = recording_callback();
    connector.register_callback(REQUEST_SCHEMA, callback);
    let error = connector.monitor_connection().expect_err("monitor must fail");
    assert!(matches!(error, ConnectionError::NotConnected));
}

#[test]
fn send_requires_connection() {
    let connector = connector_reading("");
    let error = connector
        .send(&reply(&ParsedChunks::new("1", "controller")))
        .expect_err("send must fail");
    assert!(matches!(error, ConnectionError::NotConnected));
}

#[test]
fn routes_envelopes_and_skips_bad_lines() {
    let input = concat!(
        r#"{"id":"1","sender":"controller","data":{"module":"echo"},"debug":["hop"]}"#,
        "\n",
        "\n",
        "this is not json\n",
        r#"{"id":"2","sender":"controller","message_type":"inventory_request"}"#,
        "\n",
        r#"{"sender":"controller"}"#,
        "\n",
    );
    let mut connector = connector_reading(input);
    let (callback, seen) = recording_callback();
    connector.register_callback(REQUEST_SCHEMA, callback);
    connector.connect().expect("connect");
    assert!(connector.is_connected());

    connector.monitor_connection().expect("clean end of input");

    assert!(!connector.is_connected());
    let delivered = seen.lock().expect("lock");
    assert_eq!(delivered.len(), 1);
    let first = delivered.first().expect("one message");
    assert_eq!(first.id(), "1");
    assert_eq!(first.sender(), "controller");
    assert_eq!(first.debug(), ["hop"]);
    assert_eq!(
        first.data(),
        Some(&MessageData::Json(json!({"module": "echo"})))
    );
}

#[test]
fn non_utf8_line_is_skipped_without_ending_the_connection() {
    let mut input = b"\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(br#"{"id":"2","sender":"controller","data":{"module":"ping"}}"#);
    input.push(b'\n');
    let mut connector = connector_reading(input);
    let (callback, seen) = recording_callback();
    connector.register_callback(REQUEST_SCHEMA, callback);
    connector.connect().expect("connect");

    connector
        .monitor_connection()
        .expect("invalid bytes are not a connection failure");

    let delivered = seen.lock().expect("lock");
    let ids: Vec<&str> = delivered.iter().map(ParsedChunks::id).collect();
    assert_eq!(ids, ["2"]);
}

#[rstest]
#[case::absent(r#"{"id":"1","sender":"c"}"#, None)]
#[case::json_default(
    r#"{"id":"1","sender":"c","data":[1]}"#,
    Some(MessageData::Json(json!([1])))
)]
#[case::text(
    r#"{"id":"1","sender":"c","data_type":"text","data":"hello"}"#,
    Some(MessageData::Text("hello".to_owned()))
)]
#[case::text_non_string(
    r#"{"id":"1","sender":"c","data_type":"text","data":{"a":1}}"#,
    Some(MessageData::Text(r#"{"a":1}"#.to_owned()))
)]
fn data_section_follows_data_type(#[case] line: &str, #[case] expected: Option<MessageData>) {
    let mut connector = connector_reading(&format!("{line}\n"));
    let (callback, seen) = recording_callback();
    connector.register_callback(REQUEST_SCHEMA, callback);
    connector.connect().expect("connect");
    connector.monitor_connection().expect("monitor");

    let delivered = seen.lock().expect("lock");
    assert_eq!(
        delivered.first().and_then(ParsedChunks::data),
        expected.as_ref()
    );
}

#[test]
fn callback_replies_through_the_connector() {
    let mut connector = connector_reading("{\"id\":\"42\",\"sender\":\"controller\"}\n");
    connector.register_callback(
        REQUEST_SCHEMA,
        Box::new(|chunks: &ParsedChunks, sender: &dyn ResponseSender| {
            sender.send(&reply(chunks)).expect("reply");
        }),
    );
    connector.connect().expect("connect");
    connector.monitor_connection().expect("monitor");

    let lines = written_lines(connector);
    assert_eq!(lines.len(), 1);
    let line = lines.first().expect("one line");
    assert_eq!(line["id"], json!("courierd-1"));
    assert_eq!(line["in_reply_to"], json!("42"));
    assert_eq!(line["recipients"], json!(["controller"]));
    assert_eq!(line["message_type"], json!(RESPONSE_SCHEMA));
    assert_eq!(line["data"], json!({"ok": true}));
    assert_eq!(line["debug"], json!([{"debug_data": "hop-1"}]));
}

#[test]
fn response_ids_are_unique() {
    let input = "{\"id\":\"1\",\"sender\":\"c\"}\n{\"id\":\"2\",\"sender\":\"c\"}\n";
    let mut connector = connector_reading(input);
    connector.register_callback(
        REQUEST_SCHEMA,
        Box::new(|chunks: &ParsedChunks, sender: &dyn ResponseSender| {
            sender.send(&reply(chunks)).expect("reply");
        }),
    );
    connector.connect().expect("connect");
    connector.monitor_connection().expect("monitor");

    let ids: Vec<Value> = written_lines(connector)
        .into_iter()
        .map(|line| line["id"].clone())
        .collect();
    assert_eq!(ids, [json!("courierd-1"), json!("courierd-2")]);
}

#[test]
fn later_callback_replaces_earlier_one() {
    let mut connector = connector_reading("{\"id\":\"1\",\"sender\":\"c\"}\n");
    let (first, first_seen) = recording_callback();
    let (second, second_seen) = recording_callback();
    connector.register_callback(REQUEST_SCHEMA, first);
    connector.register_callback(REQUEST_SCHEMA, second);
    connector.connect().expect("connect");
    connector.monitor_connection().expect("monitor");

    assert!(first_seen.lock().expect("lock").is_empty());
    assert_eq!(second_seen.lock().expect("lock").len(), 1);
}
