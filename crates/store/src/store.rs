use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gantry_chunker::ChunkerError;

use crate::StoreError;
use crate::layout::{
    TEMP_WRITE_PREFIX, artifact_name, chunk_dir, chunk_file, is_valid_hash, parse_chunk_dir_name,
    parse_chunk_index,
};

/// What a dedupe/resume probe found for a (fingerprint, chunk size) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The merged artifact already exists. Nothing to transfer.
    Existing { artifact: String },
    /// Every chunk is stored but the artifact is not merged yet.
    ReadyToMerge,
    /// Some chunks are stored. `held` lists their indices, ascending.
    Partial { held: Vec<u32> },
    /// Nothing is stored for this fingerprint and chunk size.
    Empty,
}

/// Filesystem-backed chunk store rooted at one directory.
///
/// All methods do blocking I/O; async callers run them under
/// `spawn_blocking`. Concurrent calls for distinct fingerprints never
/// collide because every path is fingerprint-scoped.
pub struct ChunkStore {
    temp_root: PathBuf,
}

impl ChunkStore {
    /// Opens a store rooted at `temp_root`, creating the directory if absent.
    pub fn new(temp_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let temp_root = temp_root.into();
        std::fs::create_dir_all(&temp_root)?;
        Ok(Self { temp_root })
    }

    /// Root directory holding chunk directories and merged artifacts.
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Read-only dedupe/resume probe. Never changes directory state.
    pub fn probe(
        &self,
        hash: &str,
        chunk_size: u32,
        chunk_count: u32,
        name: &str,
    ) -> Result<ProbeOutcome, StoreError> {
        check_hash(hash)?;
        check_name(name)?;

        let artifact = artifact_name(hash, name);
        if self.temp_root.join(&artifact).exists() {
            return Ok(ProbeOutcome::Existing { artifact });
        }

        let dir = chunk_dir(&self.temp_root, hash, chunk_size);
        if !dir.is_dir() {
            return Ok(ProbeOutcome::Empty);
        }

        let mut held = list_chunk_indices(&dir, hash)?;
        held.sort_unstable();
        if held.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        if held.len() as u32 == chunk_count {
            return Ok(ProbeOutcome::ReadyToMerge);
        }
        Ok(ProbeOutcome::Partial { held })
    }

    /// Writes one chunk durably: temp name, flush, rename into place.
    ///
    /// `index` must be below `chunk_count`, which keeps the chunk
    /// directory's file count bounded no matter what a client sends.
    pub fn write_chunk(
        &self,
        hash: &str,
        chunk_size: u32,
        chunk_count: u32,
        index: u32,
        name: &str,
        data: &[u8],
    ) -> Result<(), StoreError> {
        check_hash(hash)?;
        check_name(name)?;
        if index >= chunk_count {
            return Err(StoreError::IndexOutOfRange {
                index,
                count: chunk_count,
            });
        }

        let dir = chunk_dir(&self.temp_root, hash, chunk_size);
        std::fs::create_dir_all(&dir)?;

        let final_path = chunk_file(&dir, hash, index);
        let temp_path = dir.join(format!("{TEMP_WRITE_PREFIX}{hash}-{index}"));

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &final_path)?;

        Ok(())
    }

    /// Concatenates all chunks in ascending index order into the artifact.
    ///
    /// Fails without touching anything when the stored chunk count does
    /// not match `chunk_count` exactly. Cleanup of the chunk directory is
    /// best-effort; the artifact is already durable when it runs. Returns
    /// the artifact file name.
    pub fn merge(
        &self,
        hash: &str,
        chunk_size: u32,
        chunk_count: u32,
        name: &str,
    ) -> Result<String, StoreError> {
        check_hash(hash)?;
        check_name(name)?;

        let artifact = artifact_name(hash, name);
        let artifact_path = self.temp_root.join(&artifact);
        let dir = chunk_dir(&self.temp_root, hash, chunk_size);

        // A crash between artifact rename and cleanup leaves the chunks
        // behind; re-merging then only has to finish the cleanup.
        if artifact_path.exists() {
            if dir.is_dir() {
                cleanup_chunk_dir(&dir, hash, chunk_count);
            }
            return Ok(artifact);
        }

        if !dir.is_dir() {
            return Err(StoreError::NoChunks(hash.to_string()));
        }

        let held = list_chunk_indices(&dir, hash)?;
        if held.len() as u32 != chunk_count {
            return Err(StoreError::CountMismatch {
                expected: chunk_count,
                actual: held.len() as u32,
            });
        }

        let temp_path = self.temp_root.join(format!("{TEMP_WRITE_PREFIX}{artifact}"));
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&temp_path)?);
        for index in 0..chunk_count {
            let mut chunk = std::fs::File::open(chunk_file(&dir, hash, index))?;
            std::io::copy(&mut chunk, &mut writer)?;
        }
        let file = writer.into_inner().map_err(std::io::Error::from)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &artifact_path)?;

        tracing::info!(hash, artifact = %artifact, chunks = chunk_count, "merged upload");

        cleanup_chunk_dir(&dir, hash, chunk_count);
        Ok(artifact)
    }

    /// Removes chunk directories untouched for longer than `ttl`.
    ///
    /// Only directories directly under the root whose names match the
    /// `<hash>-<chunkSize>` shape are candidates. Returns how many were
    /// removed.
    pub fn sweep_stale(&self, ttl: Duration) -> Result<u32, StoreError> {
        let mut removed = 0u32;

        for entry in std::fs::read_dir(&self.temp_root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read storage root entry");
                    continue;
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if parse_chunk_dir_name(name).is_none() {
                continue;
            }

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "failed to read mtime");
                    continue;
                }
            };
            let age = match std::time::SystemTime::now().duration_since(modified) {
                Ok(age) => age,
                Err(_) => continue,
            };
            if age <= ttl {
                continue;
            }

            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(dir = %path.display(), age_secs = age.as_secs(), "swept stale chunk directory");
                }
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "failed to sweep chunk directory");
                }
            }
        }

        Ok(removed)
    }
}

/// Indices of the complete chunk files in `dir`, unordered.
///
/// Temp-prefixed and foreign file names are ignored.
fn list_chunk_indices(dir: &Path, hash: &str) -> Result<Vec<u32>, StoreError> {
    let mut held = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(index) = parse_chunk_index(name, hash) {
            held.push(index);
        }
    }
    Ok(held)
}

/// Unlinks every chunk file, then the directory itself if empty.
///
/// Failures are logged and swallowed: the merged artifact is already
/// correct, and a non-empty leftover directory stays visible as a signal
/// rather than being force-removed.
fn cleanup_chunk_dir(dir: &Path, hash: &str, chunk_count: u32) {
    for index in 0..chunk_count {
        let path = chunk_file(dir, hash, index);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file = %path.display(), error = %e, "failed to remove chunk file");
            }
        }
    }

    if let Err(e) = std::fs::remove_dir(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "chunk directory not removed after merge");
    }
}

fn check_hash(hash: &str) -> Result<(), StoreError> {
    if is_valid_hash(hash) {
        Ok(())
    } else {
        Err(StoreError::InvalidHash(hash.to_string()))
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    gantry_chunker::validate_file_name(name).map_err(|e| match e {
        ChunkerError::InvalidName(msg) => StoreError::InvalidName(msg),
        other => StoreError::InvalidName(other.to_string()),
    })
}
