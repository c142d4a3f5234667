//! Gateway-side chunk storage.
//!
//! Chunks for one upload live under `<root>/<hash>-<chunkSize>/` as files
//! named `<hash>-<index>`; the merged artifact lands at
//! `<root>/<hash>.<ext>`. All writes go to a temporary name first and are
//! renamed into place after a durable flush, so probes never observe
//! partial files.

mod layout;
mod store;

pub use layout::{
    TEMP_WRITE_PREFIX, artifact_name, chunk_dir, chunk_file, is_temp_write_name, is_valid_hash,
    parse_chunk_dir_name,
};
pub use store::{ChunkStore, ProbeOutcome};

/// Errors produced by the chunk store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("invalid fingerprint: {0}")]
    InvalidHash(String),

    #[error("chunk index {index} out of range (chunk count {count})")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("chunk count mismatch: expected {expected}, found {actual}")]
    CountMismatch { expected: u32, actual: u32 },

    #[error("no chunks stored for fingerprint {0}")]
    NoChunks(String),
}
