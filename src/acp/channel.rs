//! Message channel over a byte-stream pipe pair.
//!
//! [`MessageChannel`] frames outbound [`Message`]s as single NDJSON lines and
//! parses inbound lines back into [`Message`]s. It has no protocol knowledge:
//! one `send` writes one line, one `receive` yields one message.
//!
//! The channel is generic over its halves so the same code drives a child
//! process's `ChildStdout` / `ChildStdin` and an in-memory
//! [`tokio::io::duplex`] pair in tests.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use crate::acp::codec::AcpCodec;
use crate::acp::message::Message;
use crate::{AppError, Result};

/// Bidirectional NDJSON message channel.
#[derive(Debug)]
pub struct MessageChannel<R, W> {
    reader: FramedRead<R, AcpCodec>,
    writer: FramedWrite<W, AcpCodec>,
}

impl<R, W> MessageChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap a reader (agent → bridge) and a writer (bridge → agent).
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(reader, AcpCodec::new()),
            writer: FramedWrite::new(writer, AcpCodec::new()),
        }
    }

    /// Serialize `message` and write it as one `\n`-terminated line.
    ///
    /// The line is flushed before returning.
    ///
    /// # Errors
    ///
    /// - [`AppError::MalformedMessage`] if serialization fails.
    /// - [`AppError::Channel`] if the write fails (e.g. the agent exited).
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message)?;
        debug!(line = %line, "acp channel: sending");
        self.writer.send(line).await.map_err(|e| match e {
            AppError::Io(msg) => AppError::Channel(format!("write failed: {msg}")),
            other => other,
        })
    }

    /// Block until one complete line arrives and parse it.
    ///
    /// Whitespace-only lines are skipped. Cancel-safe: a partially received
    /// line stays buffered if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`AppError::ChannelClosed`] at end-of-input.
    /// - [`AppError::MalformedMessage`] if the line is not a valid message.
    /// - [`AppError::Channel`] on I/O failure or an oversized line.
    pub async fn receive(&mut self) -> Result<Message> {
        loop {
            let line = match self.reader.next().await {
                None => return Err(AppError::ChannelClosed),
                Some(item) => item?,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(line = trimmed, "acp channel: received");
            return serde_json::from_str(trimmed).map_err(|e| {
                AppError::MalformedMessage(format!("{e}: {}", truncate(trimmed, 200)))
            });
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
