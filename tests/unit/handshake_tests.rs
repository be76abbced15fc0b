//! Unit tests for the initialize / initialized / session/new handshake,
//! driven against a scripted in-memory agent.

use std::path::PathBuf;

use serde_json::json;

use agent_bridge::acp::handshake::{ClientInfo, Handshake, HandshakeState};
use agent_bridge::acp::message::RequestIds;
use agent_bridge::AppError;

use super::scripted_peer::{chunk, pair};

fn client() -> ClientInfo {
    ClientInfo {
        name: "bridge-under-test".into(),
        version: "0.0.0".into(),
        protocol_version: 1,
        cwd: PathBuf::from("/work/space"),
    }
}

#[tokio::test]
async fn completes_and_returns_session_id() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let init = peer.read_json().await;
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["id"], 1);
        assert_eq!(init["params"]["protocolVersion"], 1);
        assert_eq!(init["params"]["clientInfo"]["name"], "bridge-under-test");
        assert_eq!(init["params"]["clientCapabilities"], json!({}));
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 1, "result": { "protocolVersion": 1 } }))
            .await;

        let initialized = peer.read_json().await;
        assert_eq!(initialized["method"], "initialized");
        assert!(initialized.get("id").is_none(), "notification must not carry an id");

        let new_session = peer.read_json().await;
        assert_eq!(new_session["method"], "session/new");
        assert_eq!(new_session["id"], 2);
        assert_eq!(new_session["params"]["cwd"], "/work/space");
        assert_eq!(new_session["params"]["mcpServers"], json!([]));
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 2, "result": { "sessionId": "sess-1" } }))
            .await;
        peer
    };

    let (result, _peer) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    assert_eq!(result.expect("handshake"), "sess-1");
    assert_eq!(handshake.state(), HandshakeState::Ready);
    assert_eq!(ids.last(), 2);
}

/// Agent notifications that arrive before a response are skipped.
#[tokio::test]
async fn skips_agent_messages_while_awaiting_response() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let _ = peer.read_json().await;
        peer.write_json(&chunk("early", "ignored")).await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 1, "result": {} }))
            .await;
        let _ = peer.read_json().await;
        let _ = peer.read_json().await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": "srv-1", "method": "session/request_permission" }))
            .await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 2, "result": { "sessionId": "sess-2" } }))
            .await;
        peer
    };

    let (result, _peer) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    assert_eq!(result.expect("handshake"), "sess-2");
}

#[tokio::test]
async fn initialize_error_degrades() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let _ = peer.read_json().await;
        peer.write_json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32600, "message": "unsupported protocol" }
        }))
        .await;
        peer
    };

    let (result, _peer) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    let err = result.expect_err("initialize rejected");
    assert!(
        matches!(&err, AppError::Handshake(msg) if msg.contains("initialize rejected") && msg.contains("unsupported protocol")),
        "unexpected error: {err}"
    );
    assert_eq!(handshake.state(), HandshakeState::Degraded);
}

#[tokio::test]
async fn missing_session_id_degrades() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let _ = peer.read_json().await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 1, "result": {} }))
            .await;
        let _ = peer.read_json().await;
        let _ = peer.read_json().await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 2, "result": { "sessionId": "" } }))
            .await;
        peer
    };

    let (result, _peer) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    let err = result.expect_err("empty session id");
    assert!(
        matches!(&err, AppError::Handshake(msg) if msg.contains("no sessionId")),
        "unexpected error: {err}"
    );
    assert_eq!(handshake.state(), HandshakeState::Degraded);
}

#[tokio::test]
async fn session_new_error_degrades() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let _ = peer.read_json().await;
        peer.write_json(&json!({ "jsonrpc": "2.0", "id": 1, "result": null }))
            .await;
        let _ = peer.read_json().await;
        let _ = peer.read_json().await;
        peer.write_json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": { "code": -32000, "message": "auth required" }
        }))
        .await;
        peer
    };

    let (result, _peer) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    let err = result.expect_err("session/new rejected");
    assert!(err.to_string().contains("session/new rejected"), "got: {err}");
    assert_eq!(handshake.state(), HandshakeState::Degraded);
}

#[tokio::test]
async fn agent_exit_mid_handshake_degrades() {
    let (mut channel, mut peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());

    let agent = async move {
        let _ = peer.read_json().await;
        drop(peer);
    };

    let (result, ()) = tokio::join!(handshake.run(&mut channel, &mut ids), agent);

    let err = result.expect_err("eof");
    assert!(
        matches!(&err, AppError::Handshake(msg) if msg.contains("closed its output")),
        "unexpected error: {err}"
    );
    assert_eq!(handshake.state(), HandshakeState::Degraded);
}

/// A machine is single-use; a second run fails without touching the wire.
#[tokio::test]
async fn second_run_is_rejected() {
    let (mut channel, peer) = pair();
    let mut ids = RequestIds::new();
    let mut handshake = Handshake::new(client());
    drop(peer);

    assert!(handshake.run(&mut channel, &mut ids).await.is_err());
    let err = handshake
        .run(&mut channel, &mut ids)
        .await
        .expect_err("second run");

    assert!(err.to_string().contains("already run"), "got: {err}");
}

#[test]
fn degrade_marks_unstarted_machine_degraded() {
    let mut handshake = Handshake::new(client());
    assert_eq!(handshake.state(), HandshakeState::Unstarted);

    handshake.degrade();
    assert_eq!(handshake.state(), HandshakeState::Degraded);
}
