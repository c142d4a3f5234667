//! Drives one upload task through verify, chunk dispatch and merge.

use std::collections::HashSet;
use std::path::Path;

use gantry_chunker::ChunkReader;
use gantry_protocol::constants::MessageType;
use gantry_protocol::frame::ChunkFrameHeader;
use gantry_protocol::messages::{
    ChunkAck, MergeRequest, MergeResult, VerifyRequest, VerifyResponse, VerifyStatus,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::UploadChannel;
use crate::error::UploadError;
use crate::speed::SpeedCalculator;
use crate::task::UploadTask;
use crate::types::{UploadEvent, UploadOutcome};

/// Runs a single upload task over a channel.
pub(crate) struct TaskRunner<'a> {
    channel: &'a dyn UploadChannel,
    cancel: CancellationToken,
    speed: SpeedCalculator,
}

impl<'a> TaskRunner<'a> {
    pub(crate) fn new(channel: &'a dyn UploadChannel, cancel: CancellationToken) -> Self {
        Self {
            channel,
            cancel,
            speed: SpeedCalculator::new(None, None),
        }
    }

    /// Runs the task to a terminal state.
    ///
    /// Progress events are sent via `events_tx`. The pipeline:
    /// 1. Verify: ask the gateway what it already holds
    /// 2. Upload: send the missing chunks, one in flight, ack-gated
    /// 3. Merge: request assembly into the final artifact
    pub(crate) async fn run(
        &self,
        path: &Path,
        task: &UploadTask,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadOutcome, UploadError> {
        let result = self.drive(path, task, events_tx).await;
        if let Err(e) = &result {
            task.fail(&e.to_string());
        }
        result
    }

    async fn drive(
        &self,
        path: &Path,
        task: &UploadTask,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadOutcome, UploadError> {
        let descriptor = task.descriptor().clone();
        let hash = descriptor.hash.clone();

        self.check_cancelled()?;

        // 1. Verify.
        let verdict = self.verify(&descriptor).await?;

        let pending: Vec<u32> = match verdict.status {
            VerifyStatus::Existing => {
                debug!(hash = %hash, "artifact already on gateway, skipping transfer");
                task.finish();
                return Ok(UploadOutcome {
                    descriptor,
                    artifact: None,
                });
            }
            VerifyStatus::Merge => Vec::new(),
            VerifyStatus::Progress => {
                let held: HashSet<u32> = verdict.index.unwrap_or_default().into_iter().collect();
                (0..descriptor.chunk_count)
                    .filter(|i| !held.contains(i))
                    .collect()
            }
            VerifyStatus::Upload => (0..descriptor.chunk_count).collect(),
        };

        debug!(hash = %hash, pending = pending.len(), "verify complete");

        // 2. Upload missing chunks.
        task.begin_upload(pending);
        self.upload_chunks(path, task, events_tx).await?;

        // 3. Merge.
        task.begin_merge();
        let _ = events_tx
            .send(UploadEvent::Merging { hash: hash.clone() })
            .await;
        let artifact = self.merge(&descriptor).await?;

        task.finish();
        Ok(UploadOutcome {
            descriptor,
            artifact: Some(artifact),
        })
    }

    /// Asks the gateway what it already holds for the file.
    async fn verify(
        &self,
        descriptor: &gantry_chunker::FileDescriptor,
    ) -> Result<VerifyResponse, UploadError> {
        let req = VerifyRequest {
            total: descriptor.chunk_count,
            chunk_size: descriptor.chunk_size,
            hash: descriptor.hash.clone(),
            name: descriptor.name.clone(),
        };

        let payload = serde_json::to_value(&req)?;
        let resp = self
            .channel
            .send_request(MessageType::FileVerify, &payload)
            .await?;

        resp.parse_payload::<VerifyResponse>()?
            .ok_or_else(|| UploadError::Upload("empty verify response".into()))
    }

    /// Sends every pending chunk, strictly one in flight.
    ///
    /// The next chunk is dispatched only after the previous ack arrived,
    /// so the gateway sees chunks in dispatched order. A rejected ack
    /// aborts the whole task.
    async fn upload_chunks(
        &self,
        path: &Path,
        task: &UploadTask,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<(), UploadError> {
        if task.pending_count() == 0 {
            return Ok(());
        }
        let descriptor = task.descriptor();

        let mut reader = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let chunk_size = descriptor.chunk_size;
            move || ChunkReader::open(&path, chunk_size)
        })
        .await
        .map_err(|e| UploadError::Upload(format!("task join error: {e}")))??;

        while let Some(index) = task.next_index() {
            self.check_cancelled()?;

            // Read off the async runtime, moving the reader in and out.
            let chunk = tokio::task::spawn_blocking({
                let mut r = reader;
                move || {
                    let data = r.read_chunk(index);
                    (r, data)
                }
            })
            .await
            .map_err(|e| UploadError::Upload(format!("task join error: {e}")))?;

            reader = chunk.0;
            let data = chunk.1?;

            let header = ChunkFrameHeader {
                id: String::new(),
                msg_type: MessageType::FileUpload,
                hash: descriptor.hash.clone(),
                chunk_size: descriptor.chunk_size,
                chunk_count: descriptor.chunk_count,
                total_size: descriptor.total_size,
                name: descriptor.name.clone(),
                index,
            };
            let resp = self.channel.send_chunk(&header, &data).await?;

            let ack = resp
                .parse_payload::<ChunkAck>()?
                .ok_or_else(|| UploadError::Upload("empty chunk ack".into()))?;
            if !ack.success {
                return Err(UploadError::ChunkRejected {
                    index,
                    msg: ack.msg,
                });
            }

            self.speed.add_sample(data.len() as u64);
            let (completed, fraction) = task.chunk_done();
            let _ = events_tx
                .send(UploadEvent::Progress {
                    hash: descriptor.hash.clone(),
                    completed,
                    total: descriptor.chunk_count,
                    fraction,
                    bytes_per_second: self.speed.bytes_per_second(),
                })
                .await;
        }

        Ok(())
    }

    /// Requests assembly and returns the artifact file name.
    async fn merge(
        &self,
        descriptor: &gantry_chunker::FileDescriptor,
    ) -> Result<String, UploadError> {
        let req = MergeRequest {
            chunk_size: descriptor.chunk_size,
            hash: descriptor.hash.clone(),
            name: descriptor.name.clone(),
            total: descriptor.chunk_count,
        };

        let payload = serde_json::to_value(&req)?;
        let resp = self
            .channel
            .send_request(MessageType::FileMerge, &payload)
            .await?;

        let result = resp
            .parse_payload::<MergeResult>()?
            .ok_or_else(|| UploadError::Upload("empty merge result".into()))?;

        if !result.success {
            return Err(UploadError::MergeFailed(result.msg));
        }
        Ok(result.data)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
