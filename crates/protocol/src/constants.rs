use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time to wait for a pong response (or any incoming message).
///
/// This acts as a read deadline: if *nothing* arrives within this window
/// (no pong, no ack, no response), the connection is considered dead. Set
/// high enough to tolerate slow disk flushes on the gateway side while a
/// large chunk is being persisted.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often the client sends keepalive pings (must be well under
/// [`WS_PONG_WAIT`]).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum WebSocket message size in bytes (50 MiB).
///
/// Leaves headroom above the largest policy chunk (16 MiB) plus its
/// frame header.
pub const WS_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Timeout for text request/response operations.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for binary chunk uploads.
///
/// Chunk writes include a durable flush on the gateway, so they can take
/// significantly longer than text requests under disk pressure.
pub const WS_BINARY_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// WebSocket message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from client to gateway
    #[serde(rename = "file/verify")]
    FileVerify,
    #[serde(rename = "file/upload")]
    FileUpload,
    #[serde(rename = "file/merge")]
    FileMerge,
    #[serde(rename = "ping")]
    Ping,

    // Responses from gateway to client
    #[serde(rename = "file/verified")]
    FileVerified,
    #[serde(rename = "file/uploaded")]
    FileUploaded,
    #[serde(rename = "file/success")]
    FileSuccess,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Common WebSocket error codes.
pub const WS_ERR_CODE_BAD_REQUEST: i32 = 400;
pub const WS_ERR_CODE_NOT_FOUND: i32 = 404;
pub const WS_ERR_CODE_CONFLICT: i32 = 409;
pub const WS_ERR_CODE_INTERNAL: i32 = 500;
pub const WS_ERR_CODE_NOT_IMPLEMENTED: i32 = 501;
