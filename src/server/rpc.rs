//! Outward JSON-RPC API.
//!
//! Two methods are exposed to callers:
//!
//! | Method        | Params                     | Result                         |
//! |---------------|----------------------------|--------------------------------|
//! | `InitSession` | `{ model? }`               | `{ success, model, mode }`     |
//! | `Chat`        | `{ message, context? }`    | `{ response }`                 |
//!
//! Errors use the standard JSON-RPC codes: `-32700` parse error, `-32602`
//! invalid params, `-32601` unknown method, and `-32000` for any bridge
//! failure (message = the error's display text).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::acp::message::{RpcError, JSONRPC_VERSION};
use crate::bridge::Bridge;
use crate::mode::BridgeMode;
use crate::Result;

/// Body could not be parsed as JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Params did not match the method's shape.
pub const INVALID_PARAMS: i64 = -32602;
/// The bridge reported an error.
pub const SERVER_ERROR: i64 = -32000;

/// Inbound request envelope.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen id, echoed verbatim.
    #[serde(default)]
    pub id: Value,
    /// Method name; a missing name is routed as an unknown method.
    #[serde(default)]
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// Outbound response envelope.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echo of the request id (`null` when the request was unparsable).
    pub id: Value,
    /// Method result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response with `code` and `message`.
    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// `InitSession` parameters.
#[derive(Debug, Default, Deserialize)]
pub struct InitSessionParams {
    /// Requested model; empty selects the configured default.
    #[serde(default)]
    pub model: String,
}

/// `InitSession` result.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitSessionResult {
    /// Always `true`; setup failures downgrade the mode instead.
    pub success: bool,
    /// Effective model.
    pub model: String,
    /// Effective mode after the start attempt.
    pub mode: BridgeMode,
}

/// `Chat` parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    /// User message.
    #[serde(default)]
    pub message: String,
    /// Optional page content to prepend.
    #[serde(default)]
    pub context: String,
}

/// `Chat` result.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResult {
    /// Assembled reply text.
    pub response: String,
}

/// Parse `body` and dispatch it, producing a response for every input.
pub async fn handle_body(bridge: &Bridge, body: &[u8]) -> RpcResponse {
    match serde_json::from_slice::<RpcRequest>(body) {
        Ok(request) => dispatch(bridge, request).await,
        Err(_) => RpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error"),
    }
}

/// Route one parsed request to its method.
pub async fn dispatch(bridge: &Bridge, request: RpcRequest) -> RpcResponse {
    info!(method = request.method.as_str(), "rpc request");
    let RpcRequest { id, method, params } = request;

    match method.as_str() {
        "InitSession" => match parse_params::<InitSessionParams>(params) {
            Some(params) => respond(id, Ok(init_session(bridge, params).await)),
            None => RpcResponse::failure(id, INVALID_PARAMS, "Invalid params"),
        },
        "Chat" => match parse_params::<ChatParams>(params) {
            Some(params) => respond(id, chat(bridge, params).await),
            None => RpcResponse::failure(id, INVALID_PARAMS, "Invalid params"),
        },
        _ => RpcResponse::failure(id, METHOD_NOT_FOUND, "Method not found"),
    }
}

/// Start (or restart) the bridge with the requested model.
///
/// Setup failures are absorbed by the bridge; the returned mode tells the
/// caller which path chat will take.
pub async fn init_session(bridge: &Bridge, params: InitSessionParams) -> InitSessionResult {
    let model = if params.model.trim().is_empty() {
        bridge.config().default_model.clone()
    } else {
        params.model
    };

    let mode = bridge.start(&model).await;
    InitSessionResult {
        success: true,
        model,
        mode,
    }
}

/// Send a chat message, starting the bridge with the default model if it
/// was never started.
///
/// # Errors
///
/// Propagates the bridge's chat error.
pub async fn chat(bridge: &Bridge, params: ChatParams) -> Result<ChatResult> {
    info!(
        message_len = params.message.len(),
        context_len = params.context.len(),
        "chat request"
    );

    if bridge.model().await.is_empty() {
        info!("bridge not started, starting with default model");
        let model = bridge.config().default_model.clone();
        bridge.start(&model).await;
    }

    let prompt = build_prompt(&params.message, &params.context);
    let response = bridge
        .chat(&prompt)
        .await
        .inspect_err(|err| error!(error = %err, "chat failed"))?;

    info!(len = response.len(), "chat response ready");
    Ok(ChatResult { response })
}

/// Combine the user message with optional page context.
#[must_use]
pub fn build_prompt(message: &str, context: &str) -> String {
    if context.is_empty() {
        message.to_owned()
    } else {
        format!("Page content:\n\n{context}\n\n---\n\nUser question: {message}")
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Option<T> {
    serde_json::from_value(params).ok()
}

fn respond<T: Serialize>(id: Value, result: Result<T>) -> RpcResponse {
    match result.and_then(|r| serde_json::to_value(r).map_err(Into::into)) {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::failure(id, SERVER_ERROR, err.to_string()),
    }
}
