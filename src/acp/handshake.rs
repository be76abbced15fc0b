//! Session handshake with a freshly spawned agent.
//!
//! Runs once per process start, before any prompt:
//!
//! 1. **`initialize`** request (protocol version, client identity, empty
//!    capability set). Any response without `error` moves to `Initialized`.
//! 2. **`initialized`** notification. No response is expected.
//! 3. **`session/new`** request (working directory, empty server list). A
//!    response carrying a non-empty `result.sessionId` moves to `Ready`.
//!
//! Any failure (error payload, missing identifier, read failure, end of
//! stream) moves the machine to the terminal [`HandshakeState::Degraded`]
//! state and returns [`AppError::Handshake`]. The caller decides what to do
//! with the process; the handshake itself never touches it.
//!
//! While waiting for a response, messages that carry a `method` (agent
//! notifications or agent-initiated requests) are logged and skipped.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::acp::channel::MessageChannel;
use crate::acp::message::{
    Message, RequestIds, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_SESSION_NEW,
};
use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// Handshake progress.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum HandshakeState {
    /// Nothing sent yet.
    #[default]
    Unstarted,
    /// `initialize` sent, awaiting its response.
    Initializing,
    /// `initialize` acknowledged.
    Initialized,
    /// `session/new` sent, awaiting the session identifier.
    SessionPending,
    /// Session established; prompting is allowed.
    Ready,
    /// Terminal failure; the interactive mode is unusable for this process.
    Degraded,
}

/// Identity and environment announced to the agent.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// `clientInfo.name`.
    pub name: String,
    /// `clientInfo.version`.
    pub version: String,
    /// `protocolVersion` sent in `initialize`.
    pub protocol_version: u32,
    /// `cwd` sent in `session/new`.
    pub cwd: PathBuf,
}

impl ClientInfo {
    /// Derive the announced identity from the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            name: config.client_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            protocol_version: config.protocol_version,
            cwd: config.working_dir(),
        }
    }
}

/// Bounded handshake state machine.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    client: ClientInfo,
}

impl Handshake {
    /// New machine in [`HandshakeState::Unstarted`].
    #[must_use]
    pub fn new(client: ClientInfo) -> Self {
        Self {
            state: HandshakeState::Unstarted,
            client,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Drive the three-step exchange to completion.
    ///
    /// Returns the agent-assigned session identifier once `Ready`.
    ///
    /// # Errors
    ///
    /// [`AppError::Handshake`] describing the failed step; the machine is left
    /// in [`HandshakeState::Degraded`].
    pub async fn run<R, W>(
        &mut self,
        channel: &mut MessageChannel<R, W>,
        ids: &mut RequestIds,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        match self.exchange(channel, ids).await {
            Ok(session_id) => Ok(session_id),
            Err(err) => {
                warn!(from = ?self.state, error = %err, "handshake degraded");
                self.state = HandshakeState::Degraded;
                Err(err)
            }
        }
    }

    /// Mark the machine degraded from outside (e.g. a timeout fired).
    pub fn degrade(&mut self) {
        if self.state != HandshakeState::Ready {
            self.state = HandshakeState::Degraded;
        }
    }

    async fn exchange<R, W>(
        &mut self,
        channel: &mut MessageChannel<R, W>,
        ids: &mut RequestIds,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if self.state != HandshakeState::Unstarted {
            return Err(AppError::Handshake(format!(
                "handshake already run (state {:?})",
                self.state
            )));
        }

        // Step 1: initialize.
        let init = Message::request(
            ids.next_id(),
            METHOD_INITIALIZE,
            json!({
                "protocolVersion": self.client.protocol_version,
                "clientInfo": {
                    "name": self.client.name,
                    "version": self.client.version,
                },
                "clientCapabilities": {}
            }),
        );
        send_step(channel, &init, METHOD_INITIALIZE).await?;
        self.advance(HandshakeState::Initializing);

        let resp = await_response(channel, METHOD_INITIALIZE).await?;
        if let Some(err) = resp.rpc_error() {
            return Err(AppError::Handshake(format!(
                "initialize rejected ({}): {}",
                err.code, err.message
            )));
        }
        debug!(result = ?resp.result, "handshake: initialize acknowledged");
        self.advance(HandshakeState::Initialized);

        // Step 2: initialized notification.
        send_step(
            channel,
            &Message::notification(METHOD_INITIALIZED, None),
            METHOD_INITIALIZED,
        )
        .await?;

        // Step 3: session/new.
        let new_session = Message::request(
            ids.next_id(),
            METHOD_SESSION_NEW,
            json!({
                "cwd": path_string(&self.client.cwd),
                "mcpServers": []
            }),
        );
        send_step(channel, &new_session, METHOD_SESSION_NEW).await?;
        self.advance(HandshakeState::SessionPending);

        let resp = await_response(channel, METHOD_SESSION_NEW).await?;
        if let Some(err) = resp.rpc_error() {
            return Err(AppError::Handshake(format!(
                "session/new rejected ({}): {}",
                err.code, err.message
            )));
        }

        let session_id = resp
            .result
            .as_ref()
            .and_then(|r| r.get("sessionId"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Handshake("session/new response carried no sessionId".into())
            })?
            .to_owned();

        self.advance(HandshakeState::Ready);
        info!(session_id, "handshake: session ready");
        Ok(session_id)
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "handshake: transition");
        self.state = next;
    }
}

async fn send_step<R, W>(
    channel: &mut MessageChannel<R, W>,
    message: &Message,
    step: &str,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    channel
        .send(message)
        .await
        .map_err(|e| AppError::Handshake(format!("failed to send {step}: {e}")))
}

/// Read until a response (a message without `method`) arrives.
async fn await_response<R, W>(channel: &mut MessageChannel<R, W>, step: &str) -> Result<Message>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = channel.receive().await.map_err(|e| match e {
            AppError::ChannelClosed => {
                AppError::Handshake(format!("agent closed its output awaiting {step} response"))
            }
            other => AppError::Handshake(format!("failed to read {step} response: {other}")),
        })?;

        if msg.is_response() {
            return Ok(msg);
        }

        debug!(
            step,
            method = msg.method_name(),
            "handshake: skipping agent message while awaiting response"
        );
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
