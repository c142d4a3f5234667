use std::path::{Path, PathBuf};

/// Prefix for in-progress writes, renamed away once durable.
pub const TEMP_WRITE_PREFIX: &str = ".gantry-upload-";

/// True for file names of writes that have not been renamed into place.
pub fn is_temp_write_name(name: &str) -> bool {
    name.starts_with(TEMP_WRITE_PREFIX)
}

/// Fingerprint shape check: exactly 64 lowercase hex characters.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64
        && hash
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Directory holding the chunks of one (fingerprint, chunk size) pair.
pub fn chunk_dir(temp_root: &Path, hash: &str, chunk_size: u32) -> PathBuf {
    temp_root.join(format!("{hash}-{chunk_size}"))
}

/// Path of the chunk file at `index` within `dir`.
pub fn chunk_file(dir: &Path, hash: &str, index: u32) -> PathBuf {
    dir.join(format!("{hash}-{index}"))
}

/// Artifact file name for a fingerprint plus the original name's extension.
pub fn artifact_name(hash: &str, original_name: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{hash}.{ext}"),
        _ => hash.to_string(),
    }
}

/// Splits a directory name of the `<hash>-<chunkSize>` form.
///
/// Returns `None` for anything else, so sweeps never touch foreign
/// directories that happen to live under the storage root.
pub fn parse_chunk_dir_name(name: &str) -> Option<(&str, u32)> {
    let (hash, size) = name.rsplit_once('-')?;
    if !is_valid_hash(hash) {
        return None;
    }
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let size: u32 = size.parse().ok()?;
    if size == 0 {
        return None;
    }
    Some((hash, size))
}

/// Extracts the index from a chunk file name of the `<hash>-<index>` form.
pub fn parse_chunk_index(name: &str, hash: &str) -> Option<u32> {
    let rest = name.strip_prefix(hash)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}
