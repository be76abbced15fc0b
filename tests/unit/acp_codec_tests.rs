//! Unit tests for the NDJSON line codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use agent_bridge::acp::codec::{AcpCodec, MAX_LINE_BYTES};
use agent_bridge::AppError;

/// A complete line is returned without its trailing newline.
#[test]
fn single_line_decodes_without_newline() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n");

    let line = codec.decode(&mut buf).expect("decode");

    assert_eq!(
        line.as_deref(),
        Some("{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}")
    );
}

/// Two lines in one buffer come out as two items, then `None`.
#[test]
fn batched_lines_decode_separately() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"a\":1}\n{\"b\":2}\n");

    assert_eq!(codec.decode(&mut buf).expect("first").as_deref(), Some("{\"a\":1}"));
    assert_eq!(codec.decode(&mut buf).expect("second").as_deref(), Some("{\"b\":2}"));
    assert!(codec.decode(&mut buf).expect("drained").is_none());
}

/// A line split across reads is held until its newline arrives.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"method\":\"sess");

    assert!(codec.decode(&mut buf).expect("partial").is_none());

    buf.extend_from_slice(b"ion/update\"}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("complete").as_deref(),
        Some("{\"method\":\"session/update\"}")
    );
}

/// A trailing line without a newline is still yielded at end of stream.
#[test]
fn unterminated_line_is_yielded_at_eof() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"id\":7}");

    assert_eq!(
        codec.decode_eof(&mut buf).expect("eof").as_deref(),
        Some("{\"id\":7}")
    );
}

/// Lines longer than the limit are rejected as a channel error.
#[test]
fn oversized_line_is_rejected() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_BYTES + 1].as_slice());

    let err = codec.decode(&mut buf).expect_err("line over the limit");

    assert!(
        matches!(&err, AppError::Channel(msg) if msg.contains("line too long")),
        "unexpected error: {err}"
    );
}

/// Encoding appends exactly one newline.
#[test]
fn encode_appends_newline() {
    let mut codec = AcpCodec::new();
    let mut dst = BytesMut::new();

    codec
        .encode("{\"jsonrpc\":\"2.0\"}".to_owned(), &mut dst)
        .expect("encode");

    assert_eq!(&dst[..], b"{\"jsonrpc\":\"2.0\"}\n");
}

/// Invalid UTF-8 is replaced rather than failing the stream, and the next
/// line decodes normally.
#[test]
fn invalid_utf8_is_replaced() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from(&b"caf\xE9\n{\"ok\":true}\n"[..]);

    assert_eq!(
        codec.decode(&mut buf).expect("lossy line").as_deref(),
        Some("caf\u{FFFD}")
    );
    assert_eq!(
        codec.decode(&mut buf).expect("next line").as_deref(),
        Some("{\"ok\":true}")
    );
}

#[test]
fn carriage_return_is_stripped() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"id\":1}\r\n");

    assert_eq!(codec.decode(&mut buf).expect("crlf").as_deref(), Some("{\"id\":1}"));
}
