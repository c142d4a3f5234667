use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks the gateway what it already holds for a file.
///
/// `hash` is the content fingerprint and `total` the number of chunks the
/// file splits into at `chunk_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub total: u32,
    pub chunk_size: u32,
    pub hash: String,
    pub name: String,
}

/// Requests assembly of previously uploaded chunks into the final file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub chunk_size: u32,
    pub hash: String,
    pub name: String,
    pub total: u32,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Gateway verdict on a verify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    /// The finished file already exists. Nothing to upload.
    #[serde(rename = "EXISTING")]
    Existing,
    /// Every chunk is present but the final file is not. Ask for a merge.
    #[serde(rename = "MERGE")]
    Merge,
    /// Some chunks are present. `index` lists the ones already stored.
    #[serde(rename = "PROGRESS")]
    Progress,
    /// Nothing is stored for this fingerprint. Upload from the start.
    #[serde(rename = "UPLOAD")]
    Upload,
}

/// Answer to a [`VerifyRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "type")]
    pub status: VerifyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<u32>>,
}

/// Acknowledges a single chunk frame.
///
/// `data` carries the index that was stored when `success` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub hash: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
}

/// Answer to a [`MergeRequest`].
///
/// `data` is the file name of the assembled artifact under the gateway's
/// storage root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub hash: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
}
