//! One-shot fallback invocation.
//!
//! When no interactive session is available, each chat call runs the agent
//! binary once in non-interactive mode:
//!
//! ```text
//! <agent_binary> -p <prompt> --output-format json --model <model>
//! ```
//!
//! stdout is captured in full and handed to [`extract_response`]. A non-zero
//! exit (or a failure to start the process at all) is a hard error carrying
//! the captured stderr.

use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// Runs the agent binary once per call.
#[derive(Debug, Clone)]
pub struct FallbackInvoker {
    binary: String,
    working_dir: PathBuf,
}

impl FallbackInvoker {
    /// Invoker for `binary`, run inside `working_dir`.
    #[must_use]
    pub fn new(binary: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            binary: binary.into(),
            working_dir,
        }
    }

    /// Invoker derived from the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.agent_binary.clone(), config.working_dir())
    }

    /// Run one non-interactive invocation and return the extracted reply.
    ///
    /// # Errors
    ///
    /// [`AppError::Fallback`] if the process cannot be started or exits
    /// unsuccessfully; the message includes the captured stderr.
    pub async fn invoke(&self, model: &str, prompt: &str) -> Result<String> {
        info!(model, len = prompt.len(), "fallback: running one-shot invocation");

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .arg("--model")
            .arg(model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.working_dir.is_dir() {
            cmd.current_dir(&self.working_dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|err| AppError::Fallback(format!("failed to run {}: {err}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "fallback: invocation failed");
            return Err(AppError::Fallback(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(len = stdout.len(), "fallback: captured output");
        Ok(extract_response(&stdout))
    }
}

/// Structured output shapes the agent is known to produce.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StructuredOutput {
    response: String,
    text: String,
    content: String,
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

/// Pull the reply text out of captured one-shot output.
///
/// Checks, in order: top-level `response`, `text`, `content` (empty strings
/// count as absent), then `candidates[0].content.parts[0].text`, returned
/// as-is even when empty. Unparsable output, or output with none of those
/// fields, is returned whitespace-trimmed.
#[must_use]
pub fn extract_response(raw: &str) -> String {
    let parsed: StructuredOutput = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(%err, "fallback: output is not structured, returning raw text");
            return raw.trim().to_owned();
        }
    };

    let candidate_text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .and_then(|p| p.text);

    [parsed.response, parsed.text, parsed.content]
        .into_iter()
        .find(|s| !s.is_empty())
        .or(candidate_text)
        .unwrap_or_else(|| raw.trim().to_owned())
}
