//! Upload manager: bounded FIFO work queue in front of a single worker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gantry_chunker::FileDescriptor;

use crate::channel::UploadChannel;
use crate::error::UploadError;
use crate::runner::TaskRunner;
use crate::task::{TaskState, UploadTask};
use crate::types::{UploadEvent, UploadOutcome};

/// Configuration for an [`UploadManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Maximum number of uploads waiting behind the active one.
    pub queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { queue_capacity: 16 }
    }
}

struct WorkItem {
    path: PathBuf,
    task: Arc<UploadTask>,
    result_tx: oneshot::Sender<Result<UploadOutcome, UploadError>>,
}

/// Handle to a submitted upload.
#[derive(Debug)]
pub struct UploadTicket {
    /// Layout and fingerprint of the submitted file.
    pub descriptor: FileDescriptor,
    result_rx: oneshot::Receiver<Result<UploadOutcome, UploadError>>,
}

impl UploadTicket {
    /// Waits for the upload to reach a terminal state.
    pub async fn wait(self) -> Result<UploadOutcome, UploadError> {
        match self.result_rx.await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Shutdown),
        }
    }
}

/// Drives uploads over one [`UploadChannel`], one file at a time.
///
/// Submissions queue FIFO behind the active upload. Each fingerprint has
/// at most one live task; a duplicate is rejected on submit rather than
/// queued. Progress and terminal outcomes arrive on the event channel
/// (see [`take_events`](Self::take_events)); per-task results also
/// resolve the [`UploadTicket`] returned by submit.
pub struct UploadManager {
    work_tx: mpsc::Sender<WorkItem>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    tasks: Arc<Mutex<HashMap<String, Arc<UploadTask>>>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UploadManager {
    /// Creates a manager and spawns its worker on the current runtime.
    pub fn new<C>(channel: C, config: ManagerConfig) -> Self
    where
        C: UploadChannel + 'static,
    {
        let channel: Arc<dyn UploadChannel> = Arc::new(channel);
        let (work_tx, work_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (events_tx, events_rx) = mpsc::channel(256);
        let tasks = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(worker_loop(
            channel,
            work_rx,
            Arc::clone(&tasks),
            events_tx.clone(),
            cancel.clone(),
        ));

        Self {
            work_tx,
            events_tx,
            events_rx: Some(events_rx),
            tasks,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token tied to the worker.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state of the live task for `hash`, if any.
    pub fn task_state(&self, hash: &str) -> Option<TaskState> {
        let tasks = self.tasks.lock().unwrap();
        tasks.get(hash).map(|t| t.state())
    }

    /// Fingerprints `path` and enqueues it for upload.
    ///
    /// The name check runs before the file is read. A fingerprint that
    /// already has a live task is rejected, as is a full queue; neither
    /// leaves any state behind.
    pub async fn submit(&self, path: impl AsRef<Path>) -> Result<UploadTicket, UploadError> {
        let path = path.as_ref().to_path_buf();

        let descriptor = tokio::task::spawn_blocking({
            let path = path.clone();
            move || gantry_chunker::describe(&path)
        })
        .await
        .map_err(|e| UploadError::Upload(format!("task join error: {e}")))??;

        let task = {
            let mut tasks = self.tasks.lock().unwrap();
            if tasks.contains_key(&descriptor.hash) {
                return Err(UploadError::AlreadyActive(descriptor.hash.clone()));
            }
            let task = Arc::new(UploadTask::new(descriptor.clone()));
            tasks.insert(descriptor.hash.clone(), Arc::clone(&task));
            task
        };

        let (result_tx, result_rx) = oneshot::channel();
        let item = WorkItem {
            path,
            task,
            result_tx,
        };
        if let Err(e) = self.work_tx.try_send(item) {
            self.tasks.lock().unwrap().remove(&descriptor.hash);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => UploadError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => UploadError::Shutdown,
            });
        }

        info!(hash = %descriptor.hash, name = %descriptor.name, "upload queued");
        let _ = self
            .events_tx
            .send(UploadEvent::Queued {
                hash: descriptor.hash.clone(),
            })
            .await;

        Ok(UploadTicket {
            descriptor,
            result_rx,
        })
    }

    /// Stops the worker: the active task aborts, everything still queued
    /// resolves through its failure path and the transport is closed.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for UploadManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Ok(mut worker) = self.worker.lock()
            && let Some(handle) = worker.take()
        {
            handle.abort();
        }
    }
}

async fn worker_loop(
    channel: Arc<dyn UploadChannel>,
    mut work_rx: mpsc::Receiver<WorkItem>,
    tasks: Arc<Mutex<HashMap<String, Arc<UploadTask>>>>,
    events_tx: mpsc::Sender<UploadEvent>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = work_rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let hash = item.task.descriptor().hash.clone();
        let runner = TaskRunner::new(channel.as_ref(), cancel.clone());
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = runner.run(&item.path, &item.task, &events_tx) => result,
        };

        match result {
            Ok(outcome) => {
                info!(hash = %hash, artifact = ?outcome.artifact, "upload completed");
                let _ = events_tx
                    .send(UploadEvent::Completed {
                        descriptor: outcome.descriptor.clone(),
                        artifact: outcome.artifact.clone(),
                    })
                    .await;
                let _ = item.result_tx.send(Ok(outcome));
            }
            Err(e) => {
                let err_msg = e.to_string();
                item.task.fail(&err_msg);
                error!(hash = %hash, error = %err_msg, "upload failed");
                let _ = events_tx
                    .send(UploadEvent::Failed {
                        hash: hash.clone(),
                        error: err_msg,
                    })
                    .await;
                let _ = item.result_tx.send(Err(e));
            }
        }
        tasks.lock().unwrap().remove(&hash);
    }

    // Teardown: everything still queued resolves through its failure path.
    work_rx.close();
    while let Some(item) = work_rx.recv().await {
        let hash = item.task.descriptor().hash.clone();
        item.task.fail("upload manager shut down");
        let _ = events_tx
            .send(UploadEvent::Failed {
                hash: hash.clone(),
                error: "upload manager shut down".into(),
            })
            .await;
        let _ = item.result_tx.send(Err(UploadError::Shutdown));
        tasks.lock().unwrap().remove(&hash);
    }
    channel.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_chunker::ChunkerError;
    use gantry_protocol::constants::MessageType;
    use gantry_protocol::envelope::Message;
    use gantry_protocol::frame::ChunkFrameHeader;
    use gantry_protocol::messages::{ChunkAck, MergeResult, VerifyResponse, VerifyStatus};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Channel that replays scripted replies and records chunk traffic.
    #[derive(Clone)]
    struct ScriptedChannel {
        responses: Arc<Mutex<Vec<Message>>>,
        chunk_sends: Arc<Mutex<Vec<(ChunkFrameHeader, Vec<u8>)>>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedChannel {
        fn new(responses: Vec<Message>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses)),
                chunk_sends: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        fn next_response(&self) -> Result<Message, UploadError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(UploadError::Channel("no mock response available".into()))
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    impl UploadChannel for ScriptedChannel {
        fn send_request(
            &self,
            _msg_type: MessageType,
            _payload: &serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
            Box::pin(async move { self.next_response() })
        }

        fn send_chunk(
            &self,
            header: &ChunkFrameHeader,
            data: &[u8],
        ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
            self.chunk_sends
                .lock()
                .unwrap()
                .push((header.clone(), data.to_vec()));
            Box::pin(async move { self.next_response() })
        }

        fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            self.closed.store(true, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    /// Channel whose requests park until the gate is released.
    #[derive(Clone)]
    struct GatedChannel {
        gate: Arc<Notify>,
        request_count: Arc<Mutex<usize>>,
        closed: Arc<AtomicBool>,
    }

    impl GatedChannel {
        fn new() -> Self {
            Self {
                gate: Arc::new(Notify::new()),
                request_count: Arc::new(Mutex::new(0)),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        fn requests_seen(&self) -> usize {
            *self.request_count.lock().unwrap()
        }
    }

    impl UploadChannel for GatedChannel {
        fn send_request(
            &self,
            _msg_type: MessageType,
            _payload: &serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
            *self.request_count.lock().unwrap() += 1;
            Box::pin(async move {
                self.gate.notified().await;
                Err(UploadError::Channel("gate released".into()))
            })
        }

        fn send_chunk(
            &self,
            _header: &ChunkFrameHeader,
            _data: &[u8],
        ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
            Box::pin(async move { Err(UploadError::Channel("no binary in gated mock".into())) })
        }

        fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            self.closed.store(true, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    fn verify_reply(status: VerifyStatus) -> Message {
        Message::new(
            "v-1",
            MessageType::FileVerified,
            Some(&VerifyResponse {
                status,
                index: None,
            }),
        )
        .unwrap()
    }

    fn ack_reply() -> Message {
        let ack = ChunkAck {
            hash: "a".repeat(64),
            success: true,
            data: Some(0),
            msg: String::new(),
        };
        Message::new("c-1", MessageType::FileUploaded, Some(&ack)).unwrap()
    }

    fn merge_reply(artifact: &str) -> Message {
        let result = MergeResult {
            hash: "a".repeat(64),
            success: true,
            data: artifact.into(),
            msg: String::new(),
        };
        Message::new("m-1", MessageType::FileSuccess, Some(&result)).unwrap()
    }

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn submit_uploads_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mp4", b"hello gantry");

        let channel = ScriptedChannel::new(vec![
            verify_reply(VerifyStatus::Upload),
            ack_reply(),
            merge_reply("merged.mp4"),
        ]);
        let mut manager = UploadManager::new(channel.clone(), ManagerConfig::default());
        let mut events_rx = manager.take_events().unwrap();

        let ticket = manager.submit(&path).await.unwrap();
        assert_eq!(ticket.descriptor.name, "clip.mp4");
        assert_eq!(ticket.descriptor.chunk_count, 1);
        let hash = ticket.descriptor.hash.clone();

        let outcome = ticket.wait().await.unwrap();
        assert_eq!(outcome.artifact.as_deref(), Some("merged.mp4"));
        assert_eq!(outcome.descriptor.hash, hash);

        // The finished task no longer counts as live.
        assert!(manager.task_state(&hash).is_none());

        let sends = channel.chunk_sends.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].1, b"hello gantry");

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(events_rx.recv().await.unwrap());
        }
        assert!(matches!(events[0], UploadEvent::Queued { .. }));
        assert!(matches!(events[1], UploadEvent::Progress { .. }));
        assert!(matches!(events[2], UploadEvent::Merging { .. }));
        match &events[3] {
            UploadEvent::Completed { artifact, .. } => {
                assert_eq!(artifact.as_deref(), Some("merged.mp4"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resubmit_allowed_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mp4", b"same bytes");

        let channel = ScriptedChannel::new(vec![
            verify_reply(VerifyStatus::Upload),
            ack_reply(),
            merge_reply("merged.mp4"),
            // Second round: the gateway now has the artifact.
            verify_reply(VerifyStatus::Existing),
        ]);
        let manager = UploadManager::new(channel, ManagerConfig::default());

        let first = manager.submit(&path).await.unwrap();
        assert!(first.wait().await.unwrap().artifact.is_some());

        let second = manager.submit(&path).await.unwrap();
        let outcome = second.wait().await.unwrap();
        assert!(outcome.artifact.is_none());
    }

    #[tokio::test]
    async fn submit_rejects_disallowed_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "tool.exe", b"MZ");

        let manager = UploadManager::new(ScriptedChannel::new(vec![]), ManagerConfig::default());
        let err = manager.submit(&path).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Chunker(ChunkerError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn submit_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mp4", b"");

        let manager = UploadManager::new(ScriptedChannel::new(vec![]), ManagerConfig::default());
        let err = manager.submit(&path).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Chunker(ChunkerError::EmptyFile(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_fingerprint_rejected_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mp4", b"busy busy");

        let channel = GatedChannel::new();
        let manager = UploadManager::new(channel.clone(), ManagerConfig::default());

        let ticket = manager.submit(&path).await.unwrap();
        let hash = ticket.descriptor.hash.clone();

        // Wait for the worker to park inside the verify request.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.requests_seen(), 1);
        assert!(manager.task_state(&hash).is_some());

        let err = manager.submit(&path).await.unwrap_err();
        match err {
            UploadError::AlreadyActive(h) => assert_eq!(h, hash),
            other => panic!("expected AlreadyActive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn queue_overflow_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.mp4", b"aaaa");
        let b = write_file(dir.path(), "b.mp4", b"bbbb");
        let c = write_file(dir.path(), "c.mp4", b"cccc");

        let channel = GatedChannel::new();
        let manager = UploadManager::new(channel.clone(), ManagerConfig { queue_capacity: 1 });

        // First submission becomes active, freeing its queue slot.
        let _active = manager.submit(&a).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.requests_seen(), 1);

        let _queued = manager.submit(&b).await.unwrap();
        let err = manager.submit(&c).await.unwrap_err();
        assert!(matches!(err, UploadError::QueueFull));
    }

    #[tokio::test]
    async fn shutdown_fails_active_and_queued() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.mp4", b"aaaa");
        let b = write_file(dir.path(), "b.mp4", b"bbbb");

        let channel = GatedChannel::new();
        let mut manager = UploadManager::new(channel.clone(), ManagerConfig::default());
        let mut events_rx = manager.take_events().unwrap();

        let ticket_a = manager.submit(&a).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let ticket_b = manager.submit(&b).await.unwrap();
        let hash_a = ticket_a.descriptor.hash.clone();
        let hash_b = ticket_b.descriptor.hash.clone();

        manager.shutdown().await;

        assert!(matches!(ticket_a.wait().await, Err(UploadError::Cancelled)));
        assert!(matches!(ticket_b.wait().await, Err(UploadError::Shutdown)));
        assert!(channel.closed.load(Ordering::SeqCst));
        assert!(manager.task_state(&hash_a).is_none());
        assert!(manager.task_state(&hash_b).is_none());

        let mut failed = 0;
        for _ in 0..4 {
            if let Some(UploadEvent::Failed { .. }) = events_rx.recv().await {
                failed += 1;
            }
        }
        assert_eq!(failed, 2);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mp4", b"late");

        let manager = UploadManager::new(GatedChannel::new(), ManagerConfig::default());
        manager.shutdown().await;

        let err = manager.submit(&path).await.unwrap_err();
        assert!(matches!(err, UploadError::Shutdown));
    }

    #[tokio::test]
    async fn take_events_once() {
        let mut manager = UploadManager::new(ScriptedChannel::new(vec![]), ManagerConfig::default());
        assert!(manager.take_events().is_some());
        assert!(manager.take_events().is_none());
    }

    #[test]
    fn default_config_has_bounded_queue() {
        let config = ManagerConfig::default();
        assert!(config.queue_capacity > 0);
    }
}
