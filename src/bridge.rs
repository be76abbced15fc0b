//! Bridge facade, the single public surface over the agent.
//!
//! A [`Bridge`] owns at most one interactive agent process and the session
//! established on it. Every operation (start, stop, chat, accessors) runs
//! under one async mutex, so prompts and restarts never interleave.
//!
//! # Mode selection
//!
//! - [`Bridge::start`] tears down any previous process, spawns a new one and
//!   runs the handshake. Any failure is logged and absorbed: the bridge drops
//!   to [`BridgeMode::Fallback`] and `start` still reports success.
//! - [`Bridge::chat`] routes to the live session when [`Bridge::is_running`],
//!   otherwise to a one-shot [`FallbackInvoker`] call.
//!
//! # Invariants
//!
//! - `session_id` is set only while the mode is interactive and the process
//!   is alive; losing either clears it.
//! - Request ids restart at 1 on every `start` and strictly increase within
//!   a process lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::acp::handshake::{ClientInfo, Handshake};
use crate::acp::message::RequestIds;
use crate::acp::prompt::run_prompt;
use crate::acp::spawner::{AgentProcess, SpawnConfig};
use crate::config::BridgeConfig;
use crate::fallback::FallbackInvoker;
use crate::mode::BridgeMode;
use crate::{AppError, Result};

/// Mutable state of one bridge instance. Only reachable through the mutex.
#[derive(Debug, Default)]
struct BridgeState {
    model: String,
    mode: BridgeMode,
    session_id: Option<String>,
    ids: RequestIds,
    process: Option<AgentProcess>,
}

impl BridgeState {
    /// Interactive, with a live process and an established session.
    ///
    /// A process found dead is reaped and the bridge downgraded.
    fn is_running(&mut self) -> bool {
        if self.mode != BridgeMode::Interactive || self.session_id.is_none() {
            return false;
        }
        let alive = self.process.as_mut().is_some_and(AgentProcess::is_alive);
        if !alive {
            self.process = None;
            self.session_id = None;
            self.mode
                .transition(BridgeMode::Fallback, "agent process is no longer alive");
        }
        alive
    }

    /// Terminate the process (if any) and clear the session, leaving the
    /// mode untouched.
    async fn teardown(&mut self) {
        self.session_id = None;
        if let Some(process) = self.process.take() {
            process.terminate().await;
        }
    }

    /// Tear down and drop to fallback.
    async fn shutdown(&mut self, reason: &str) {
        self.teardown().await;
        self.mode.transition(BridgeMode::Fallback, reason);
    }
}

/// Protocol bridge between callers and one external agent.
#[derive(Debug)]
pub struct Bridge {
    config: Arc<BridgeConfig>,
    fallback: FallbackInvoker,
    state: Mutex<BridgeState>,
}

impl Bridge {
    /// Create an idle bridge (no process, fallback mode, no model).
    #[must_use]
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        let fallback = FallbackInvoker::from_config(&config);
        Self {
            config,
            fallback,
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// Configuration this bridge was built with.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// (Re)start the interactive agent with `model`.
    ///
    /// Always succeeds from the caller's point of view; the returned mode
    /// tells whether the interactive session came up.
    pub async fn start(&self, model: &str) -> BridgeMode {
        let span = info_span!("bridge_start", model);
        async {
            let mut state = self.state.lock().await;

            if state.process.is_some() {
                info!("restarting agent");
            }
            // The mode is settled once the new attempt has an outcome, so a
            // healthy restart never passes through fallback.
            state.teardown().await;
            model.clone_into(&mut state.model);
            state.ids.reset();

            let spawn_config = SpawnConfig::from_config(&self.config);
            let mut process = match AgentProcess::spawn(&spawn_config, model) {
                Ok(process) => process,
                Err(err) => {
                    warn!(error = %err, "interactive mode unavailable, using fallback");
                    state.mode.transition(BridgeMode::Fallback, "agent spawn failed");
                    return state.mode;
                }
            };

            let mut handshake = Handshake::new(ClientInfo::from_config(&self.config));
            let result = {
                let run = handshake.run(&mut process.channel, &mut state.ids);
                match self.config.handshake_timeout() {
                    Some(limit) => with_timeout(limit, run, "handshake").await,
                    None => run.await,
                }
            };

            match result {
                Ok(session_id) => {
                    state.session_id = Some(session_id);
                    state.process = Some(process);
                    state
                        .mode
                        .transition(BridgeMode::Interactive, "handshake complete");
                }
                Err(err) => {
                    handshake.degrade();
                    warn!(error = %err, "handshake failed, using fallback");
                    process.terminate().await;
                    state.mode.transition(BridgeMode::Fallback, "handshake failed");
                }
            }

            state.mode
        }
        .instrument(span)
        .await
    }

    /// Terminate the agent process, if any. Idempotent.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.process.is_some() {
            info!("stopping agent");
        }
        state.shutdown("bridge stopped").await;
    }

    /// Send `prompt` and return the assembled reply.
    ///
    /// Blocks indefinitely on the agent unless `prompt_timeout_seconds` is
    /// configured.
    ///
    /// # Errors
    ///
    /// See [`Bridge::chat_with_cancel`].
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        self.chat_with_cancel(prompt, CancellationToken::new()).await
    }

    /// Send `prompt`, abandoning the interactive turn if `cancel` fires.
    ///
    /// Any interactive outcome other than a completed turn or an agent error
    /// payload (cancellation, timeout, broken or truncated stream) leaves the
    /// agent's stream out of step, so the process is terminated and the
    /// bridge drops to fallback.
    ///
    /// # Errors
    ///
    /// - [`AppError::Agent`] if the agent answers with an error payload.
    /// - [`AppError::Channel`] / [`AppError::MalformedMessage`] on a broken stream.
    /// - [`AppError::Cancelled`] if `cancel` fires or the prompt timeout elapses.
    /// - [`AppError::Fallback`] if the one-shot invocation fails.
    pub async fn chat_with_cancel(&self, prompt: &str, cancel: CancellationToken) -> Result<String> {
        let mut state = self.state.lock().await;

        if !state.is_running() {
            let model = if state.model.is_empty() {
                self.config.default_model.clone()
            } else {
                state.model.clone()
            };
            return self.fallback.invoke(&model, prompt).await;
        }

        let BridgeState {
            session_id,
            ids,
            process,
            ..
        } = &mut *state;
        let (Some(session_id), Some(process)) = (session_id.as_deref(), process.as_mut()) else {
            return Err(AppError::Channel("no live session".into()));
        };

        let result = {
            let run = run_prompt(&mut process.channel, ids, session_id, prompt, &cancel);
            match self.config.prompt_timeout() {
                Some(limit) => with_timeout(limit, run, "prompt").await,
                None => run.await,
            }
        };

        match result {
            Ok(outcome) => {
                if !outcome.completed {
                    state.shutdown("agent closed its output mid-prompt").await;
                }
                Ok(outcome.text)
            }
            // The turn ended cleanly on the agent side; the session stays usable.
            Err(err @ AppError::Agent { .. }) => Err(err),
            Err(err) => {
                state.shutdown("prompt stream abandoned").await;
                Err(err)
            }
        }
    }

    /// Whether chat currently routes to a live interactive session.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Model named by the most recent `start`, empty before the first one.
    pub async fn model(&self) -> String {
        self.state.lock().await.model.clone()
    }

    /// Current operating mode.
    pub async fn mode(&self) -> BridgeMode {
        let mut state = self.state.lock().await;
        // Refresh liveness so a crashed agent is reported as fallback.
        state.is_running();
        state.mode
    }

    /// Identifier of the live session, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id.clone()
    }

    /// OS process id of the live agent, if any.
    pub async fn agent_pid(&self) -> Option<u32> {
        self.state
            .lock()
            .await
            .process
            .as_ref()
            .and_then(AgentProcess::pid)
    }
}

/// Bound `fut` by `limit`, mapping expiry to [`AppError::Cancelled`].
async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
    phase: &str,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(AppError::Cancelled(format!("{phase} timed out after {limit:?}"))))
}
