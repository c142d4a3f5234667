//! Wire protocol for gantry client-gateway communication.
//!
//! All traffic flows over one WebSocket per client. Text frames carry a
//! JSON [`Message`] envelope; chunk payloads travel as binary frames
//! (see [`frame`]) so the bytes are never base64-inflated. Every
//! gateway message answers a client request and reuses its `id`.

pub mod constants;
pub mod envelope;
pub mod frame;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{Message, WsError};
pub use frame::{ChunkFrameHeader, FrameError, encode_chunk_frame, parse_chunk_frame};
pub use messages::{ChunkAck, MergeRequest, MergeResult, VerifyRequest, VerifyResponse, VerifyStatus};
