//! JSON-RPC shaped message envelope exchanged with the agent.
//!
//! One [`Message`] is one line on the wire:
//!
//! ```json
//! { "jsonrpc": "2.0", "id": 3, "method": "session/prompt", "params": { … } }
//! ```
//!
//! Requests carry `id` and `method`, notifications carry `method` only, and
//! responses carry `id` plus exactly one of `result` / `error`. The envelope
//! does not enforce that exclusivity on input; callers classify with
//! [`Message::has_result`] and [`Message::has_error`].
//!
//! The `error` payload is kept as raw JSON and interpreted leniently through
//! [`Message::rpc_error`], so an agent that sends a string code or a bare
//! string (or even `null`) still surfaces as an error.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Protocol version tag written on every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Handshake step 1 request.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Handshake step 2 notification.
pub const METHOD_INITIALIZED: &str = "initialized";
/// Handshake step 3 request.
pub const METHOD_SESSION_NEW: &str = "session/new";
/// Prompt request.
pub const METHOD_SESSION_PROMPT: &str = "session/prompt";
/// Streaming notification emitted while a prompt is in flight.
pub const METHOD_SESSION_UPDATE: &str = "session/update";

/// Request identifier. The bridge only ever sends numbers, but agents may
/// use strings for requests they initiate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Numeric identifier.
    Number(u64),
    /// String identifier.
    Text(String),
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

/// Placeholder message for an error payload that carries no description.
pub const UNSPECIFIED_AGENT_ERROR: &str = "unspecified agent error";

/// `error` payload of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error description.
    #[serde(default)]
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Structured envelope for every line exchanged with the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol version tag.
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Present on requests and responses, absent on notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Present on requests and notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request / notification payload.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub params: Option<Value>,
    /// Successful response payload. `"result": null` counts as present.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub result: Option<Value>,
    /// Failed response payload, raw. `"error": null` counts as present.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub error: Option<Value>,
}

impl Message {
    /// Build a request carrying `id`.
    #[must_use]
    pub fn request(id: impl Into<MessageId>, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Some(id.into()),
            method: Some(method.to_owned()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    /// Build a notification (no `id`, no response expected).
    #[must_use]
    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id: None,
            method: Some(method.to_owned()),
            params,
            result: None,
            error: None,
        }
    }

    /// Build a successful response.
    #[must_use]
    pub fn response(id: impl Into<MessageId>, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Some(id.into()),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error_response(id: impl Into<MessageId>, code: i64, message: &str) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Some(id.into()),
            method: None,
            params: None,
            result: None,
            error: Some(json!({ "code": code, "message": message })),
        }
    }

    /// Method name, or `""` for responses.
    #[must_use]
    pub fn method_name(&self) -> &str {
        self.method.as_deref().unwrap_or("")
    }

    /// Whether the message carries a `method` and no `id`.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// Whether the message is a response (no `method`).
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.method.is_none()
    }

    /// Whether a `result` field is present (even `null`).
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Whether an `error` field is present (even `null`).
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Interpret the `error` payload, if present.
    ///
    /// Numeric or numeric-string `code`s are honoured, anything else is `0`.
    /// The message is the payload's `message` string, the payload itself when
    /// it is a bare string, [`UNSPECIFIED_AGENT_ERROR`] for `null`, and the
    /// payload's JSON text otherwise.
    #[must_use]
    pub fn rpc_error(&self) -> Option<RpcError> {
        self.error.as_ref().map(lenient_rpc_error)
    }
}

fn lenient_rpc_error(raw: &Value) -> RpcError {
    let code = match raw.get("code") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let message = match raw {
        Value::Null => UNSPECIFIED_AGENT_ERROR.to_owned(),
        Value::String(s) => s.clone(),
        other => match other.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => other.to_string(),
        },
    };
    RpcError {
        code,
        message,
        data: raw.get("data").cloned(),
    }
}

/// Monotonic request identifier source, reset on every bridge `start`.
///
/// [`RequestIds::next_id`] pre-increments, so the first id after a reset is `1`.
#[derive(Debug, Default, Clone)]
pub struct RequestIds {
    last: u64,
}

impl RequestIds {
    /// Fresh counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Last identifier handed out, `0` if none.
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Forget every identifier issued so far.
    pub fn reset(&mut self) {
        self.last = 0;
    }
}

fn default_version() -> String {
    JSONRPC_VERSION.to_owned()
}

/// Deserialize a field that is present in the input, mapping JSON `null` to
/// `Some(Value::Null)` instead of `None`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
