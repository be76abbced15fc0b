#![forbid(unsafe_code)]

//! Protocol bridge between a request/response caller and an interactive
//! coding agent speaking the Agent Client Protocol over stdio, with silent
//! degradation to one-shot invocations.

pub mod acp;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod mode;
pub mod server;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use errors::{AppError, Result};
pub use mode::BridgeMode;
