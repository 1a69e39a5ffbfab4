//! rdvs — rendezvous and message-relay server.
//!
//! Peers connect over a persistent WebSocket at `/<namespace>/<session>/<peerId>`,
//! are validated and registered in an in-memory registry, and exchange small
//! JSON control messages with other peers in the same session.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Session-name validation, path parsing and connection authorization.
pub mod admission;
/// CLI argument parsing and server configuration.
pub mod config;
mod connection;
/// Error types for relay server operations.
pub mod error;
/// Platform namespaces and per-namespace peer-id grammars.
pub mod identity;
/// Prometheus metrics collection and HTTP endpoint.
pub mod metrics;
/// Session-scoped registry of connected peers.
pub mod registry;
mod route;
/// Accept loop and shared server state.
pub mod server;

pub use server::{run, run_with_shutdown, ServerState};
