//! Client-side coordination of chunked uploads.
//!
//! This crate implements the **business logic** for pushing large files
//! to a gantry gateway. It is a library crate with no transport
//! dependencies: the calling app provides an `UploadChannel`
//! implementation that bridges to the actual WebSocket client.
//!
//! # Pipeline
//!
//! 1. **Describe**: fingerprint the file and derive its chunk layout
//! 2. **Verify**: ask the gateway what it already holds
//! 3. **Upload**: send missing chunks one at a time, ack-gated
//! 4. **Merge**: request assembly into the final artifact
//!
//! An [`UploadManager`] drives this pipeline for one file at a time;
//! further submissions queue FIFO behind the active one. Progress and
//! terminal outcomes are delivered over an event channel.

pub mod channel;
pub mod error;
pub mod manager;
mod runner;
pub mod speed;
pub mod task;
pub mod types;

// Re-export primary types for convenience.
pub use channel::UploadChannel;
pub use error::UploadError;
pub use manager::{ManagerConfig, UploadManager, UploadTicket};
pub use speed::SpeedCalculator;
pub use task::{TaskState, UploadTask};
pub use types::{UploadEvent, UploadOutcome};
