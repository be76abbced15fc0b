//! Agent process spawner.
//!
//! Spawns the interactive agent with:
//! - stdin / stdout piped and wrapped in a [`MessageChannel`];
//! - stderr inherited so the agent's diagnostics reach the bridge's own log;
//! - `kill_on_drop(true)` so a dropped handle never leaks a child.
//!
//! Termination is best-effort: [`AgentProcess::terminate`] signals the child,
//! waits for it to be reaped, and ignores failures.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::acp::channel::MessageChannel;
use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// Channel type bound to a child's stdio.
pub type AgentChannel = MessageChannel<ChildStdout, ChildStdin>;

/// How to launch the interactive agent.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Agent executable.
    pub binary: String,
    /// Flags selecting the interactive protocol, placed before `--model`.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
}

impl SpawnConfig {
    /// Derive spawn settings from the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            binary: config.agent_binary.clone(),
            args: config.interactive_args.clone(),
            working_dir: config.working_dir(),
        }
    }
}

/// A live interactive agent process and the channel over its stdio.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
    pid: Option<u32>,
    /// Message channel over the child's stdout / stdin.
    pub channel: AgentChannel,
}

impl AgentProcess {
    /// Spawn `binary <args…> --model <model>` in interactive mode.
    ///
    /// # Errors
    ///
    /// - [`AppError::Spawn`] if the OS refuses to start the process or its
    ///   pipes cannot be captured.
    pub fn spawn(config: &SpawnConfig, model: &str) -> Result<Self> {
        let mut cmd = Command::new(&config.binary);
        cmd.args(&config.args)
            .arg("--model")
            .arg(model)
            .current_dir(existing_dir(&config.working_dir))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Spawn(format!("failed to spawn {}: {err}", config.binary)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stdout".into()))?;

        let pid = child.id();
        info!(
            pid = pid.unwrap_or(0),
            model,
            binary = config.binary,
            "agent process spawned"
        );

        Ok(Self {
            child,
            pid,
            channel: MessageChannel::new(stdout, stdin),
        })
    }

    /// OS process id captured at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking liveness probe.
    ///
    /// Reaps the child if it has exited. A failed probe counts as not alive.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(pid = self.pid.unwrap_or(0), %status, "agent process has exited");
                false
            }
            Err(err) => {
                warn!(pid = self.pid.unwrap_or(0), %err, "failed to poll agent process");
                false
            }
        }
    }

    /// Kill the child and wait for it to be reaped. Failures are logged only.
    pub async fn terminate(mut self) {
        let pid = self.pid.unwrap_or(0);
        if let Err(err) = self.child.kill().await {
            // Already exited and reaped is the common case here.
            debug!(pid, %err, "agent kill failed");
        }
        info!(pid, "agent process terminated");
    }
}

/// The configured directory, or `.` if it has disappeared since startup.
fn existing_dir(dir: &Path) -> &Path {
    if dir.is_dir() {
        dir
    } else {
        Path::new(".")
    }
}
