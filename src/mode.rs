//! Bridge operating mode: which path a chat request takes.
//!
//! `BridgeMode` is the tagged variant behind the silent downgrade: a bridge
//! starts every `start` attempt aiming for [`BridgeMode::Interactive`] and
//! drops to [`BridgeMode::Fallback`] on any setup failure. Transitions go
//! through [`BridgeMode::transition`] so every downgrade is logged.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Operating mode of a bridge instance.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// Persistent agent process driven over the session protocol.
    Interactive,
    /// One-shot invocation of the agent per chat call. Default until a
    /// handshake succeeds.
    #[default]
    Fallback,
}

impl BridgeMode {
    /// Wire / log name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Fallback => "fallback",
        }
    }

    /// Move to `next`, logging the reason.
    ///
    /// Downgrades to [`BridgeMode::Fallback`] are logged at `WARN`, everything
    /// else at `INFO`. Self-transitions are silent.
    pub fn transition(&mut self, next: Self, reason: &str) {
        if *self == next {
            return;
        }
        match next {
            Self::Fallback => warn!(from = self.as_str(), reason, "bridge mode -> fallback"),
            Self::Interactive => info!(from = self.as_str(), reason, "bridge mode -> interactive"),
        }
        *self = next;
    }
}

impl Display for BridgeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
