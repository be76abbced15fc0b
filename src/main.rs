#![forbid(unsafe_code)]

//! `agent-bridge` serves the bridge's JSON-RPC API over HTTP.
//!
//! Loads configuration, starts the HTTP transport, and on SIGINT / SIGTERM
//! drains the server before terminating the agent process.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_bridge::server::http;
use agent_bridge::{AppError, Bridge, BridgeConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-bridge", about = "ACP agent bridge server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port (takes precedence over `PORT`).
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    info!(
        binary = config.agent_binary,
        model = config.default_model,
        port = config.http_port,
        "configuration loaded"
    );

    let bridge = Arc::new(Bridge::new(Arc::new(config)));
    let ct = CancellationToken::new();

    let server_ct = ct.clone();
    let server_bridge = Arc::clone(&bridge);
    let mut server = tokio::spawn(async move { http::serve(server_bridge, server_ct).await });

    let joined = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received, draining http transport");
            ct.cancel();
            (&mut server).await
        }
        joined = &mut server => joined,
    };

    let outcome = match joined {
        Ok(result) => result,
        Err(err) => Err(AppError::Config(format!("http server task failed: {err}"))),
    };
    if let Err(ref err) = outcome {
        error!(%err, "http transport exited with error");
    }

    bridge.stop().await;
    info!("agent-bridge stopped");
    outcome
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                if let Err(err) = ctrl_c.await {
                    tracing::error!(%err, "ctrl-c signal handler failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
