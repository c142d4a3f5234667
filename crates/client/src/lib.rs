//! WebSocket client for talking to a gantry upload gateway.
//!
//! Provides request-response correlation over a persistent connection,
//! the binary chunk frame path, and ping/pong keepalive.

pub(crate) mod pumps;
pub mod ws_client;

pub use ws_client::{WsClient, WsError};
