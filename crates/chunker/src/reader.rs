use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::ChunkerError;
use crate::policy::chunk_count;

/// Reads a file as fixed-size chunks addressed by 0-based index.
///
/// The final chunk is shorter whenever the file size is not a multiple of
/// the chunk size.
pub struct ChunkReader {
    file: std::fs::File,
    chunk_size: u32,
    chunk_count: u32,
    total_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading. Empty files are rejected.
    pub fn open(path: &Path, chunk_size: u32) -> Result<Self, ChunkerError> {
        let file = std::fs::File::open(path)?;
        let total_size = file.metadata()?.len();
        if total_size == 0 {
            return Err(ChunkerError::EmptyFile(path.display().to_string()));
        }
        Ok(Self {
            file,
            chunk_size,
            chunk_count: chunk_count(total_size, chunk_size),
            total_size,
        })
    }

    /// Reads the chunk at `index` in full.
    pub fn read_chunk(&mut self, index: u32) -> Result<Vec<u8>, ChunkerError> {
        if index >= self.chunk_count {
            return Err(ChunkerError::ChunkOutOfRange {
                index,
                count: self.chunk_count,
            });
        }

        let offset = index as u64 * self.chunk_size as u64;
        let len = std::cmp::min(self.chunk_size as u64, self.total_size - offset) as usize;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Byte length of the chunk at `index`, without reading it.
    pub fn chunk_len(&self, index: u32) -> u64 {
        if index >= self.chunk_count {
            return 0;
        }
        let offset = index as u64 * self.chunk_size as u64;
        std::cmp::min(self.chunk_size as u64, self.total_size - offset)
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks in the file.
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Total file size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}
