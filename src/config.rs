//! Bridge configuration parsing, validation, and environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

fn default_agent_binary() -> String {
    "gemini".into()
}

fn default_interactive_args() -> Vec<String> {
    vec!["--experimental-acp".into()]
}

fn default_model() -> String {
    "gemini-3-flash-preview".into()
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    6363
}

fn default_client_name() -> String {
    "agent-bridge".into()
}

fn default_protocol_version() -> u32 {
    1
}

fn default_allowed_origins() -> Vec<String> {
    vec!["chrome-extension://".into(), "http://localhost".into()]
}

/// Bridge configuration parsed from an optional `config.toml`.
///
/// Every field has a default so an empty document (or no file at all) yields
/// a usable configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Agent executable used for both the interactive and one-shot modes.
    #[serde(default = "default_agent_binary")]
    pub agent_binary: String,
    /// Flags selecting the interactive protocol; `--model <model>` is appended.
    #[serde(default = "default_interactive_args")]
    pub interactive_args: Vec<String>,
    /// Model used when a caller does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port the HTTP listener binds to.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Working directory for spawned agents; the process cwd when unset.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// `clientInfo.name` announced during the handshake.
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// `protocolVersion` announced during the handshake.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
    /// Handshake read bound in seconds; 0 blocks indefinitely.
    #[serde(default)]
    pub handshake_timeout_seconds: u64,
    /// Prompt read bound in seconds; 0 blocks indefinitely.
    #[serde(default)]
    pub prompt_timeout_seconds: u64,
    /// Origin prefixes allowed by the CORS layer.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            agent_binary: default_agent_binary(),
            interactive_args: default_interactive_args(),
            default_model: default_model(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            workspace_root: None,
            client_name: default_client_name(),
            protocol_version: default_protocol_version(),
            handshake_timeout_seconds: 0,
            prompt_timeout_seconds: 0,
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `AGENT_BRIDGE_BINARY` and `AGENT_BRIDGE_MODEL` from the
    /// process environment.
    ///
    /// An unparsable `PORT` is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an override leaves the config invalid.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = env::var("PORT") {
            match port.parse::<u16>() {
                Ok(parsed) => self.http_port = parsed,
                Err(err) => warn!(%port, %err, "ignoring unparsable PORT"),
            }
        }
        if let Ok(binary) = env::var("AGENT_BRIDGE_BINARY") {
            self.agent_binary = binary;
        }
        if let Ok(model) = env::var("AGENT_BRIDGE_MODEL") {
            self.default_model = model;
        }
        self.validate()
    }

    /// Directory spawned agents run in and that `session/new` announces.
    ///
    /// Falls back to the process working directory, then to `.`.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Handshake read bound, `None` when unbounded.
    #[must_use]
    pub fn handshake_timeout(&self) -> Option<Duration> {
        non_zero_seconds(self.handshake_timeout_seconds)
    }

    /// Prompt read bound, `None` when unbounded.
    #[must_use]
    pub fn prompt_timeout(&self) -> Option<Duration> {
        non_zero_seconds(self.prompt_timeout_seconds)
    }

    /// Whether an `Origin` header value is allowed by the CORS layer.
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|prefix| !prefix.is_empty() && origin.starts_with(prefix.as_str()))
    }

    fn validate(&mut self) -> Result<()> {
        if self.agent_binary.trim().is_empty() {
            return Err(AppError::Config("agent_binary must not be empty".into()));
        }

        if self.default_model.trim().is_empty() {
            return Err(AppError::Config("default_model must not be empty".into()));
        }

        if let Some(root) = &self.workspace_root {
            let canonical = root
                .canonicalize()
                .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
            self.workspace_root = Some(canonical);
        }

        Ok(())
    }
}

fn non_zero_seconds(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}
