//! WebSocket server for the gantry upload gateway.
//!
//! Accepts client connections, dispatches JSON and binary chunk messages
//! to a [`Handler`] trait, and manages connection lifecycles (pong
//! deadlines, graceful shutdown). Within one connection dispatch is
//! strictly sequential: a handler finishes before the next frame is read,
//! so chunk writes naturally backpressure the sending client.

mod connection;
mod handler;
mod server;
mod service;

pub use connection::Sender;
pub use handler::{Handler, HandlerFuture};
pub use server::{ServerConfig, UploadServer};
pub use service::UploadService;

/// Send buffer capacity.
///
/// Dispatch is sequential, so at most one reply is pending per request;
/// the headroom is for protocol pongs interleaving with replies.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("send buffer full")]
    SendBufferFull,

    #[error("connection closed")]
    ConnectionClosed,
}
