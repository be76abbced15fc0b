//! Agent Client Protocol (ACP) plumbing.
//!
//! Everything needed to drive one interactive agent process over its stdio:
//! - `codec`: NDJSON line framing with a per-line size limit.
//! - `message`: the JSON-RPC shaped envelope and request id counter.
//! - `channel`: one-message-per-call send / receive over a pipe pair.
//! - `spawner`: process spawn, liveness and termination.
//! - `handshake`: the initialize / initialized / session/new state machine.
//! - `prompt`: one `session/prompt` turn with streaming aggregation.

pub mod channel;
pub mod codec;
pub mod handshake;
pub mod message;
pub mod prompt;
pub mod spawner;
