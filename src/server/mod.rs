//! Outward-facing surface: the JSON-RPC API and its HTTP transport.

pub mod http;
pub mod rpc;
