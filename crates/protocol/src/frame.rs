//! Binary chunk frames: 4-byte big-endian header length + JSON header + raw chunk bytes.

use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Header for binary chunk frames.
///
/// `id` correlates the frame with its text acknowledgement. The remaining
/// fields let the gateway place the chunk without any per-connection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFrameHeader {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub hash: String,
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub total_size: u64,
    pub name: String,
    pub index: u32,
}

/// Parses a raw binary WebSocket frame into a chunk header and its bytes.
///
/// Wire format: `[4 bytes: header_len (big-endian)][header_len bytes: JSON][rest: chunk bytes]`
pub fn parse_chunk_frame(data: &[u8]) -> Result<(ChunkFrameHeader, Vec<u8>), FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let header_len = (data[0] as usize) << 24
        | (data[1] as usize) << 16
        | (data[2] as usize) << 8
        | (data[3] as usize);

    if data.len() < 4 + header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header_bytes = &data[4..4 + header_len];
    let payload = data[4 + header_len..].to_vec();

    let header: ChunkFrameHeader =
        serde_json::from_slice(header_bytes).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    if header.msg_type != MessageType::FileUpload {
        return Err(FrameError::UnexpectedType(header.msg_type));
    }

    Ok((header, payload))
}

/// Encodes a chunk frame for sending over WebSocket.
pub fn encode_chunk_frame(
    header: &ChunkFrameHeader,
    payload: &[u8],
) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Errors from binary frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected frame type {0:?} (want file/upload)")]
    UnexpectedType(MessageType),
}
