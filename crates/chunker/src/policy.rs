const MIB: u64 = 1024 * 1024;

/// Chunk size for a file of `total_size` bytes.
///
/// The table is fixed rather than negotiated: the fingerprint and the
/// gateway's chunk directories are both keyed by chunk size, so resume
/// only works while both sides derive the same value.
pub fn chunk_size_for(total_size: u64) -> u32 {
    if total_size <= 64 * MIB {
        (2 * MIB) as u32
    } else if total_size <= 512 * MIB {
        (4 * MIB) as u32
    } else if total_size <= 2048 * MIB {
        (8 * MIB) as u32
    } else {
        (16 * MIB) as u32
    }
}

/// Number of chunks a file of `total_size` bytes splits into.
pub fn chunk_count(total_size: u64, chunk_size: u32) -> u32 {
    total_size.div_ceil(chunk_size as u64) as u32
}
