//! Data types for the upload flow.

use gantry_chunker::FileDescriptor;

/// Event emitted while uploads run.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// A submission entered the work queue.
    Queued { hash: String },
    /// One more chunk was acknowledged by the gateway.
    Progress {
        hash: String,
        completed: u32,
        total: u32,
        fraction: f64,
        bytes_per_second: f64,
    },
    /// Every chunk is on the gateway; assembly was requested.
    Merging { hash: String },
    /// The upload finished. `artifact` is the assembled file name on the
    /// gateway, absent when the file already existed and no merge ran.
    Completed {
        descriptor: FileDescriptor,
        artifact: Option<String>,
    },
    /// The upload failed.
    Failed { hash: String, error: String },
}

/// Final result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub descriptor: FileDescriptor,
    pub artifact: Option<String>,
}
