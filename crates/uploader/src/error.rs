//! Upload error types.

/// Errors produced while coordinating an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Chunker(#[from] gantry_chunker::ChunkerError),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("chunk {index} rejected: {msg}")]
    ChunkRejected { index: u32, msg: String },

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("transfer already in progress for {0}")]
    AlreadyActive(String),

    #[error("upload queue full")]
    QueueFull,

    #[error("upload manager shut down")]
    Shutdown,

    #[error("cancelled")]
    Cancelled,

    #[error("upload failed: {0}")]
    Upload(String),
}
