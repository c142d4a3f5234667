use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::reader::ChunkReader;
use crate::validation::validate_file_name;
use crate::{ChunkerError, policy};

/// Number of chunks sampled for a fingerprint.
const SAMPLE_TARGET: u32 = 10;

/// Chunk layout and content fingerprint of a file prepared for upload.
///
/// `hash` is derived from sampled chunk bytes plus the layout, so it
/// identifies (content, chunk size) pairs rather than content alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub hash: String,
    pub name: String,
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub total_size: u64,
}

/// Chunk indices fed into the fingerprint for a file of `chunk_count` chunks.
///
/// Small files sample every chunk. Larger files sample roughly
/// [`SAMPLE_TARGET`] evenly spaced chunks plus the final chunk, so appends
/// and truncations always change the fingerprint.
pub fn sample_indices(chunk_count: u32) -> Vec<u32> {
    if chunk_count <= 2 * SAMPLE_TARGET {
        return (0..chunk_count).collect();
    }

    let step = chunk_count / SAMPLE_TARGET;
    let mut indices: Vec<u32> = (0..SAMPLE_TARGET).map(|i| i * step).collect();
    let last = chunk_count - 1;
    if indices.last() != Some(&last) {
        indices.push(last);
    }
    indices
}

/// Computes the sampled SHA-256 fingerprint of an open [`ChunkReader`].
///
/// The layout (chunk size, total size) is hashed before the sampled chunk
/// bytes, in ascending index order. Hex-encoded digest.
pub fn fingerprint_file(reader: &mut ChunkReader) -> Result<String, ChunkerError> {
    let mut hasher = Sha256::new();
    hasher.update(reader.chunk_size().to_be_bytes());
    hasher.update(reader.total_size().to_be_bytes());

    for index in sample_indices(reader.chunk_count()) {
        hasher.update(reader.read_chunk(index)?);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Validates, measures and fingerprints `path`, producing its descriptor.
///
/// The name check runs before the file is touched. Empty files are
/// rejected.
pub fn describe(path: &Path) -> Result<FileDescriptor, ChunkerError> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_owned(),
        None => {
            return Err(ChunkerError::InvalidName(format!(
                "path has no usable file name: {}",
                path.display()
            )));
        }
    };
    validate_file_name(&name)?;

    let total_size = std::fs::metadata(path)?.len();
    let chunk_size = policy::chunk_size_for(total_size);
    let mut reader = ChunkReader::open(path, chunk_size)?;
    let hash = fingerprint_file(&mut reader)?;

    Ok(FileDescriptor {
        hash,
        name,
        chunk_size,
        chunk_count: reader.chunk_count(),
        total_size,
    })
}
