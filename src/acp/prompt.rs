//! Prompt exchange and streaming aggregation.
//!
//! [`run_prompt`] sends one `session/prompt` request and folds the agent's
//! streamed `session/update` notifications into a single response string.
//!
//! # Termination
//!
//! | Inbound                      | Outcome                                  |
//! |------------------------------|------------------------------------------|
//! | message with `result`        | done; `stopReason` recorded if present   |
//! | message with `error`         | [`AppError::Agent`]; partial text dropped |
//! | end of stream                | done with the text so far (not an error) |
//! | cancellation token fires     | [`AppError::Cancelled`]                  |
//!
//! Only `agent_message_chunk` updates contribute text. Fragments are appended
//! in arrival order, never reordered, deduplicated or trimmed.

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::acp::channel::MessageChannel;
use crate::acp::message::{Message, RequestIds, METHOD_SESSION_PROMPT, METHOD_SESSION_UPDATE};
use crate::{AppError, Result};

/// Payload of a `session/update` notification, tagged by `sessionUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum StreamingUpdate {
    /// Fragment of the agent's reply.
    AgentMessageChunk {
        /// Content block carrying the fragment.
        content: ChunkContent,
    },
    /// Any other update kind (thoughts, tool calls, plans, …).
    #[serde(other)]
    Other,
}

/// Content block of an `agent_message_chunk`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChunkContent {
    /// Text fragment; absent for non-text blocks.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    update: StreamingUpdate,
}

impl StreamingUpdate {
    /// Extract the update from a `session/update` notification.
    ///
    /// Returns `None` for any other method or an unparsable payload.
    #[must_use]
    pub fn from_message(message: &Message) -> Option<Self> {
        if message.method.as_deref() != Some(METHOD_SESSION_UPDATE) {
            return None;
        }
        let params = message.params.clone()?;
        serde_json::from_value::<UpdateParams>(params)
            .map(|p| p.update)
            .ok()
    }

    /// Text this update contributes to the aggregated response.
    #[must_use]
    pub fn chunk_text(&self) -> Option<&str> {
        match self {
            Self::AgentMessageChunk { content } => content.text.as_deref(),
            Self::Other => None,
        }
    }
}

/// Result of one prompt turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOutcome {
    /// Concatenated chunk text in receipt order.
    pub text: String,
    /// `result.stopReason`, when the turn completed with one.
    pub stop_reason: Option<String>,
    /// `false` when the stream ended before the completion message.
    pub completed: bool,
}

/// Build the `session/prompt` request for `prompt`.
#[must_use]
pub fn prompt_request(id: u64, session_id: &str, prompt: &str) -> Message {
    Message::request(
        id,
        METHOD_SESSION_PROMPT,
        json!({
            "sessionId": session_id,
            "prompt": [{ "type": "text", "text": prompt }]
        }),
    )
}

/// Send `prompt` on `session_id` and aggregate the streamed reply.
///
/// # Errors
///
/// - [`AppError::Channel`] if the request cannot be written or a read fails.
/// - [`AppError::MalformedMessage`] if the agent emits an unparsable line.
/// - [`AppError::Agent`] if the agent answers with an `error` payload.
/// - [`AppError::Cancelled`] if `cancel` fires first.
pub async fn run_prompt<R, W>(
    channel: &mut MessageChannel<R, W>,
    ids: &mut RequestIds,
    session_id: &str,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<PromptOutcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request_id = ids.next_id();
    channel
        .send(&prompt_request(request_id, session_id, prompt))
        .await
        .map_err(|e| match e {
            AppError::Channel(msg) => AppError::Channel(format!("failed to send prompt: {msg}")),
            other => other,
        })?;
    debug!(request_id, session_id, len = prompt.len(), "prompt sent");

    let mut outcome = PromptOutcome::default();

    loop {
        let received = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(AppError::Cancelled(format!(
                    "prompt {request_id} cancelled after {} bytes",
                    outcome.text.len()
                )));
            }

            received = channel.receive() => received,
        };

        let message = match received {
            Ok(message) => message,
            Err(AppError::ChannelClosed) => {
                info!(
                    request_id,
                    len = outcome.text.len(),
                    "agent stream ended mid-prompt, returning partial text"
                );
                return Ok(outcome);
            }
            Err(err) => return Err(err),
        };

        if message.has_result() {
            outcome.stop_reason = message
                .result
                .as_ref()
                .and_then(|r| r.get("stopReason"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned);
            outcome.completed = true;
            info!(
                request_id,
                stop_reason = outcome.stop_reason.as_deref().unwrap_or(""),
                len = outcome.text.len(),
                "prompt turn complete"
            );
            return Ok(outcome);
        }

        if let Some(err) = message.rpc_error() {
            return Err(AppError::Agent {
                code: err.code,
                message: err.message,
            });
        }

        match StreamingUpdate::from_message(&message) {
            Some(update) => {
                if let Some(text) = update.chunk_text() {
                    outcome.text.push_str(text);
                }
            }
            None => debug!(
                method = message.method_name(),
                "ignoring message while awaiting prompt result"
            ),
        }
    }
}
