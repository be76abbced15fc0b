//! Error types shared across the bridge.

use std::fmt::{Display, Formatter};

/// Shared bridge result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Bridge error enumeration covering every failure mode of the protocol
/// bridge and its outward surface.
///
/// Setup-time failures (`Spawn`, `Handshake`) are absorbed by the bridge into
/// a mode downgrade; only `Agent`, `Fallback`, `Channel` and `Cancelled`
/// normally reach a chat caller.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The external agent process could not be created.
    Spawn(String),
    /// The initialize / session handshake did not complete.
    Handshake(String),
    /// An inbound line was not a well-formed protocol message.
    MalformedMessage(String),
    /// The agent's output stream reached end-of-input.
    ChannelClosed,
    /// Read or write failure on the agent's stdio pipes.
    Channel(String),
    /// The agent answered a prompt with an explicit `error` payload.
    Agent {
        /// JSON-RPC error code reported by the agent.
        code: i64,
        /// Human-readable error message reported by the agent.
        message: String,
    },
    /// The one-shot fallback invocation failed; carries captured stderr.
    Fallback(String),
    /// An in-flight handshake or prompt was cancelled or timed out.
    Cancelled(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Handshake(msg) => write!(f, "handshake: {msg}"),
            Self::MalformedMessage(msg) => write!(f, "malformed message: {msg}"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::Channel(msg) => write!(f, "channel: {msg}"),
            Self::Agent { code, message } => write!(f, "agent error {code}: {message}"),
            Self::Fallback(msg) => write!(f, "fallback: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
