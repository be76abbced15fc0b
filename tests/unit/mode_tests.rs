use agent_bridge::BridgeMode;

#[test]
fn default_is_fallback() {
    assert_eq!(BridgeMode::default(), BridgeMode::Fallback);
}

#[test]
fn names_are_snake_case() {
    assert_eq!(BridgeMode::Interactive.to_string(), "interactive");
    assert_eq!(
        serde_json::to_value(BridgeMode::Fallback).expect("serialize"),
        serde_json::json!("fallback")
    );
    let parsed: BridgeMode = serde_json::from_str("\"interactive\"").expect("parse");
    assert_eq!(parsed, BridgeMode::Interactive);
}

#[test]
fn transition_moves_both_ways() {
    let mut mode = BridgeMode::Fallback;

    mode.transition(BridgeMode::Interactive, "handshake complete");
    assert_eq!(mode, BridgeMode::Interactive);

    mode.transition(BridgeMode::Fallback, "agent exited");
    assert_eq!(mode, BridgeMode::Fallback);

    mode.transition(BridgeMode::Fallback, "no-op");
    assert_eq!(mode, BridgeMode::Fallback);
}
