use agent_bridge::AppError;

#[test]
fn display_prefixes_category() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Spawn("enoent".into()), "spawn: enoent"),
        (AppError::Handshake("rejected".into()), "handshake: rejected"),
        (AppError::MalformedMessage("eof".into()), "malformed message: eof"),
        (AppError::ChannelClosed, "channel closed"),
        (AppError::Channel("pipe".into()), "channel: pipe"),
        (AppError::Fallback("exit 1".into()), "fallback: exit 1"),
        (AppError::Cancelled("timeout".into()), "cancelled: timeout"),
        (AppError::Io("disk".into()), "io: disk"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn agent_error_carries_code_and_message() {
    let err = AppError::Agent {
        code: -32603,
        message: "internal".into(),
    };
    assert_eq!(err.to_string(), "agent error -32603: internal");
}

#[test]
fn json_errors_map_to_malformed_message() {
    let err: AppError = serde_json::from_str::<serde_json::Value>("{")
        .expect_err("invalid json")
        .into();
    assert!(matches!(err, AppError::MalformedMessage(_)));
}

#[test]
fn io_errors_map_to_io() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
    assert_eq!(err.to_string(), "io: gone");
}
