//! HTTP transport for the outward API.
//!
//! Routes:
//! - `POST /rpc`: JSON-RPC dispatch (see [`super::rpc`]).
//! - `GET /health`: `{"status":"ok","model":…,"mode":…}`.
//!
//! A CORS middleware wraps every route. It echoes allowed `Origin`s and
//! answers preflight `OPTIONS` requests itself, before routing.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::rpc::{handle_body, RpcResponse};
use crate::bridge::Bridge;
use crate::mode::BridgeMode;
use crate::{AppError, Result};

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Always `"ok"`.
    pub status: String,
    /// Current model, empty before the first start.
    pub model: String,
    /// Current mode.
    pub mode: BridgeMode,
}

/// Build the router over `bridge`.
#[must_use]
pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/rpc", post(rpc))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(Arc::clone(&bridge), cors))
        .with_state(bridge)
}

/// Bind `bind_address:http_port` from the bridge config and serve until
/// `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener cannot bind or the server fails.
pub async fn serve(bridge: Arc<Bridge>, ct: CancellationToken) -> Result<()> {
    let addr = format!(
        "{}:{}",
        bridge.config().bind_address,
        bridge.config().http_port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    serve_listener(listener, bridge, ct).await
}

/// Serve on an already-bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_listener(
    listener: TcpListener,
    bridge: Arc<Bridge>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener has no local address: {err}")))?;
    info!(%local, "http transport listening");
    info!("rpc endpoint: http://{local}/rpc");

    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("http server error: {err}")))?;

    info!("http transport shut down");
    Ok(())
}

async fn rpc(State(bridge): State<Arc<Bridge>>, body: Bytes) -> Json<RpcResponse> {
    Json(handle_body(&bridge, &body).await)
}

async fn health(State(bridge): State<Arc<Bridge>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".into(),
        model: bridge.model().await,
        mode: bridge.mode().await,
    })
}

async fn cors(State(bridge): State<Arc<Bridge>>, request: Request, next: Next) -> Response {
    let allowed_origin = request
        .headers()
        .get(ORIGIN)
        .filter(|origin| {
            origin
                .to_str()
                .is_ok_and(|o| bridge.config().origin_allowed(o))
        })
        .cloned();

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    if let Some(origin) = allowed_origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
