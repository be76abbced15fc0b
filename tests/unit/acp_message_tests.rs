//! Unit tests for the message envelope and request id counter.

use serde_json::json;

use agent_bridge::acp::message::{
    Message, MessageId, RequestIds, RpcError, METHOD_INITIALIZED, UNSPECIFIED_AGENT_ERROR,
};

#[test]
fn request_serializes_with_id_and_method() {
    let msg = Message::request(3, "session/prompt", json!({ "sessionId": "s" }));
    let value = serde_json::to_value(&msg).expect("serialize");

    assert_eq!(
        value,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "session/prompt",
            "params": { "sessionId": "s" }
        })
    );
}

/// Notifications built without params omit the field entirely.
#[test]
fn notification_without_params_omits_field() {
    let msg = Message::notification(METHOD_INITIALIZED, None);
    let value = serde_json::to_value(&msg).expect("serialize");

    assert_eq!(value, json!({ "jsonrpc": "2.0", "method": "initialized" }));
    assert!(msg.is_notification());
    assert!(!msg.is_response());
}

#[test]
fn error_response_is_classified() {
    let msg: Message = serde_json::from_str(
        r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32603,"message":"boom"}}"#,
    )
    .expect("parse");

    assert!(msg.is_response());
    assert!(msg.has_error());
    assert!(!msg.has_result());
    let err = msg.rpc_error().expect("error payload");
    assert_eq!(err.code, -32603);
    assert_eq!(err.message, "boom");
}

/// Non-conforming error payloads are still interpreted, never dropped.
#[test]
fn lenient_error_payloads() {
    let parse = |raw: &str| -> RpcError {
        let msg: Message = serde_json::from_str(raw).expect("parse");
        assert!(msg.has_error());
        msg.rpc_error().expect("error payload")
    };

    let string_code = parse(r#"{"id":1,"error":{"code":"-32000","message":"busy"}}"#);
    assert_eq!((string_code.code, string_code.message.as_str()), (-32000, "busy"));

    let word_code = parse(r#"{"id":1,"error":{"code":"E_BUSY","message":"busy"}}"#);
    assert_eq!(word_code.code, 0);

    let bare_string = parse(r#"{"id":1,"error":"rate limited"}"#);
    assert_eq!((bare_string.code, bare_string.message.as_str()), (0, "rate limited"));

    let no_message = parse(r#"{"id":1,"error":{"code":7,"data":{"retry":true}}}"#);
    assert_eq!(no_message.code, 7);
    assert_eq!(no_message.message, r#"{"code":7,"data":{"retry":true}}"#);
    assert_eq!(no_message.data, Some(serde_json::json!({ "retry": true })));

    let null = parse(r#"{"id":1,"error":null}"#);
    assert_eq!(null.message, UNSPECIFIED_AGENT_ERROR);
}

#[test]
fn error_response_builder_round_trips_through_rpc_error() {
    let msg = Message::error_response(4u64, -32601, "no such method");
    let err = msg.rpc_error().expect("error payload");
    assert_eq!(err.code, -32601);
    assert_eq!(err.message, "no such method");
    assert!(err.data.is_none());
}

/// Agents may use string ids for requests they initiate.
#[test]
fn string_ids_are_accepted() {
    let msg: Message =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":"req-9","method":"fs/read_text_file"}"#)
            .expect("parse");

    assert_eq!(msg.id, Some(MessageId::Text("req-9".into())));
    assert_eq!(msg.method_name(), "fs/read_text_file");
    assert!(!msg.is_notification());
}

/// Response constructor round-trips through the wire shape.
#[test]
fn response_constructor_matches_wire() {
    let msg = Message::response(5, json!({ "sessionId": "abc" }));
    let text = serde_json::to_string(&msg).expect("serialize");
    let parsed: Message = serde_json::from_str(&text).expect("parse");

    assert_eq!(parsed, msg);
    assert_eq!(parsed.id, Some(MessageId::Number(5)));
}

#[test]
fn request_ids_start_at_one_and_reset() {
    let mut ids = RequestIds::new();
    assert_eq!(ids.last(), 0);
    assert_eq!(ids.next_id(), 1);
    assert_eq!(ids.next_id(), 2);
    assert_eq!(ids.last(), 2);

    ids.reset();
    assert_eq!(ids.last(), 0);
    assert_eq!(ids.next_id(), 1);
}
