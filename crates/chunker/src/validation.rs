use std::path::{Component, Path};

use crate::ChunkerError;

/// File extensions accepted for upload, lowercase.
///
/// The same list gates submissions client-side and received chunk frames
/// gateway-side.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "7z", "avi", "flac", "gif", "gz", "jpeg", "jpg", "m4a", "mkv", "mov", "mp3", "mp4", "pdf",
    "png", "tar", "wav", "webm", "webp", "zip",
];

/// Validates an upload file name against the allow-list.
///
/// Accepts only bare names (no directory components) with an extension in
/// [`ALLOWED_EXTENSIONS`], compared case-insensitively.
pub fn validate_file_name(name: &str) -> Result<(), ChunkerError> {
    if name.is_empty() {
        return Err(ChunkerError::InvalidName("empty name".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(ChunkerError::InvalidName(format!(
            "directory separators not allowed: {name}"
        )));
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => {
            return Err(ChunkerError::InvalidName(format!(
                "not a bare file name: {name}"
            )));
        }
    }

    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
        _ => {
            return Err(ChunkerError::InvalidName(format!(
                "missing file extension: {name}"
            )));
        }
    };

    let ext = ext.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ChunkerError::InvalidName(format!(
            "extension not allowed: {name}"
        )));
    }

    Ok(())
}
