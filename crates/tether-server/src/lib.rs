//! # tether-server
//!
//! Remote tool invocation over plain HTTP, using a long-lived Server-Sent
//! Events stream for server→client traffic and short POST calls for
//! client→server traffic, correlated by a session id.
//!
//! - [`transport`]: channel registry, handshake, heartbeat, inbound dispatch,
//!   and the responder that separates call acknowledgment from channel writes
//! - [`rpc`]: JSON-RPC 2.0 message handler over a [`ToolCatalog`](tether_core::ToolCatalog)
//! - [`server`]: Axum router, CORS, health, metrics, graceful shutdown

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use config::ServerConfig;
pub use errors::TransportError;
pub use server::TetherServer;
