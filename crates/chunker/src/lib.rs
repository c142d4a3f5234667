//! Client-side chunking for large-file uploads: the chunk-size policy
//! table, indexed chunk reads, sampled content fingerprints, and the
//! upload name allow-list shared with the gateway.

mod fingerprint;
mod policy;
mod reader;
mod validation;

pub use fingerprint::{FileDescriptor, describe, fingerprint_file, sample_indices};
pub use policy::{chunk_count, chunk_size_for};
pub use reader::ChunkReader;
pub use validation::{ALLOWED_EXTENSIONS, validate_file_name};

/// Errors produced by the chunker crate.
#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("empty file: {0}")]
    EmptyFile(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("chunk index {index} out of range (chunk count {count})")]
    ChunkOutOfRange { index: u32, count: u32 },
}
