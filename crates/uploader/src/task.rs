//! Per-file upload task bookkeeping.

use std::collections::VecDeque;
use std::sync::RwLock;

use gantry_chunker::FileDescriptor;

/// Lifecycle of a single upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the work queue.
    Queued,
    /// Chunks are being dispatched.
    Uploading,
    /// All chunks acknowledged; merge requested.
    Merging,
    /// Artifact assembled (or already present on the gateway).
    Done,
    /// Terminal failure; see [`UploadTask::error`].
    Failed,
}

/// Tracks one file upload (thread-safe).
///
/// The descriptor is fixed at creation; state, the pending index queue
/// and the completed count change as the runner works through the file.
pub struct UploadTask {
    descriptor: FileDescriptor,
    inner: RwLock<TaskInner>,
}

struct TaskInner {
    state: TaskState,
    pending: VecDeque<u32>,
    completed: u32,
    error: String,
}

impl UploadTask {
    /// Creates a queued task for `descriptor`.
    pub(crate) fn new(descriptor: FileDescriptor) -> Self {
        Self {
            descriptor,
            inner: RwLock::new(TaskInner {
                state: TaskState::Queued,
                pending: VecDeque::new(),
                completed: 0,
                error: String::new(),
            }),
        }
    }

    /// The file this task uploads.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// Moves to `Uploading` with the chunk indices still to send.
    ///
    /// Chunks the gateway already holds count as completed, so the
    /// progress fraction covers the whole file on resume.
    pub(crate) fn begin_upload(&self, pending: Vec<u32>) {
        let mut t = self.inner.write().unwrap();
        t.completed = self.descriptor.chunk_count - pending.len() as u32;
        t.pending = pending.into();
        t.state = TaskState::Uploading;
    }

    /// Pops the next chunk index to dispatch.
    pub(crate) fn next_index(&self) -> Option<u32> {
        let mut t = self.inner.write().unwrap();
        t.pending.pop_front()
    }

    /// Number of chunks still to send.
    pub fn pending_count(&self) -> usize {
        let t = self.inner.read().unwrap();
        t.pending.len()
    }

    /// Records one acknowledged chunk. Returns the new completed count
    /// and overall fraction.
    pub(crate) fn chunk_done(&self) -> (u32, f64) {
        let mut t = self.inner.write().unwrap();
        t.completed += 1;
        let fraction = f64::from(t.completed) / f64::from(self.descriptor.chunk_count);
        (t.completed, fraction)
    }

    /// Marks the task as merging.
    pub(crate) fn begin_merge(&self) {
        let mut t = self.inner.write().unwrap();
        t.state = TaskState::Merging;
    }

    /// Marks the task as done.
    pub(crate) fn finish(&self) {
        let mut t = self.inner.write().unwrap();
        t.state = TaskState::Done;
    }

    /// Marks the task as failed, unless it already reached a terminal
    /// state.
    pub(crate) fn fail(&self, err: &str) {
        let mut t = self.inner.write().unwrap();
        if matches!(t.state, TaskState::Done | TaskState::Failed) {
            return;
        }
        t.state = TaskState::Failed;
        t.error = err.to_string();
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        let t = self.inner.read().unwrap();
        t.state
    }

    /// Chunks acknowledged so far, including ones the gateway already
    /// held at verify time.
    pub fn completed_count(&self) -> u32 {
        let t = self.inner.read().unwrap();
        t.completed
    }

    /// Overall progress in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let t = self.inner.read().unwrap();
        f64::from(t.completed) / f64::from(self.descriptor.chunk_count)
    }

    /// Failure message, empty unless the task failed.
    pub fn error(&self) -> String {
        let t = self.inner.read().unwrap();
        t.error.clone()
    }

    /// Returns `true` while the task has not reached `Done` or `Failed`.
    pub fn is_active(&self) -> bool {
        let t = self.inner.read().unwrap();
        !matches!(t.state, TaskState::Done | TaskState::Failed)
    }
}
