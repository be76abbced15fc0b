//! NDJSON line codec for the agent's stdio streams.
//!
//! Frames on `\n` through [`tokio_util::codec::AnyDelimiterCodec`] with a
//! maximum line length, so a misbehaving agent cannot make the bridge buffer
//! an unterminated line forever. Lines are decoded as lossy UTF-8: invalid
//! byte sequences become U+FFFD instead of failing the stream. Used by
//! [`MessageChannel`](crate::acp::channel::MessageChannel) as the codec for
//! both its [`FramedRead`](tokio_util::codec::FramedRead) and
//! [`FramedWrite`](tokio_util::codec::FramedWrite) halves.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};
use tracing::debug;

use crate::{AppError, Result};

/// Maximum inbound line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

const NEWLINE: &[u8] = b"\n";

/// Newline-delimited codec with a [`MAX_LINE_BYTES`] decode limit.
///
/// Inbound lines longer than the limit yield
/// [`AppError::Channel`]`("line too long: …")`; the rest of the oversized
/// line is discarded and decoding resumes at the next newline. A trailing
/// `\r` is dropped. Outbound strings are written as `item\n`.
#[derive(Debug)]
pub struct AcpCodec(AnyDelimiterCodec);

impl AcpCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            NEWLINE.to_vec(),
            NEWLINE.to_vec(),
            MAX_LINE_BYTES,
        ))
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let line = self.0.decode(src).map_err(map_codec_error)?;
        Ok(line.map(into_text))
    }

    /// A trailing line without `\n` is still yielded once the stream ends.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let line = self.0.decode_eof(src).map_err(map_codec_error)?;
        Ok(line.map(into_text))
    }
}

impl Encoder<String> for AcpCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn into_text(line: Bytes) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
    match String::from_utf8_lossy(line) {
        Cow::Borrowed(text) => text.to_owned(),
        Cow::Owned(text) => {
            debug!(len = line.len(), "agent line is not valid UTF-8, replaced invalid bytes");
            text
        }
    }
}

fn map_codec_error(e: AnyDelimiterCodecError) -> AppError {
    match e {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            AppError::Channel(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        AnyDelimiterCodecError::Io(io_err) => AppError::Channel(io_err.to_string()),
    }
}
