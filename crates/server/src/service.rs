//! Gateway-side upload logic on top of a [`ChunkStore`].

use std::sync::Arc;

use tracing::{error, warn};

use gantry_protocol::MessageType;
use gantry_protocol::envelope::Message;
use gantry_protocol::frame::ChunkFrameHeader;
use gantry_protocol::messages::{
    ChunkAck, MergeRequest, MergeResult, VerifyRequest, VerifyResponse, VerifyStatus,
};
use gantry_store::{ChunkStore, ProbeOutcome, StoreError};

use crate::connection::Sender;
use crate::handler::{Handler, HandlerFuture};

/// Implements the verify, chunk and merge operations of the upload
/// protocol against a shared chunk store.
///
/// The store only does blocking I/O, so every store call runs under
/// `spawn_blocking`. One service instance serves all connections.
pub struct UploadService {
    store: Arc<ChunkStore>,
}

impl UploadService {
    /// Creates a service over the given store.
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }

    /// The underlying chunk store.
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    async fn handle_verify(&self, sender: Sender, msg: Message) {
        let req: VerifyRequest = match msg.parse_payload() {
            Ok(Some(r)) => r,
            _ => {
                let _ = sender.send_error(&msg, 400, "invalid payload");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let probed = tokio::task::spawn_blocking(move || {
            store.probe(&req.hash, req.chunk_size, req.total, &req.name)
        })
        .await;

        let resp = match probed {
            Ok(Ok(outcome)) => verify_response(outcome),
            Ok(Err(e)) => {
                warn!("verify failed: {e}");
                let _ = sender.send_error(&msg, error_code(&e), &e.to_string());
                return;
            }
            Err(e) => {
                error!("verify task failed: {e}");
                let _ = sender.send_error(&msg, 500, "internal error");
                return;
            }
        };

        if let Ok(reply) = msg.reply(MessageType::FileVerified, Some(&resp)) {
            let _ = sender.send_msg(reply);
        }
    }

    async fn handle_chunk(&self, sender: Sender, header: ChunkFrameHeader, data: Vec<u8>) {
        let store = Arc::clone(&self.store);
        let hash = header.hash.clone();
        let name = header.name.clone();
        let (chunk_size, chunk_count, index) = (header.chunk_size, header.chunk_count, header.index);

        let written = tokio::task::spawn_blocking(move || {
            store.write_chunk(&hash, chunk_size, chunk_count, index, &name, &data)
        })
        .await;

        // The client blocks on this ack, so every outcome produces one.
        let ack = match written {
            Ok(Ok(())) => ChunkAck {
                hash: header.hash.clone(),
                success: true,
                data: Some(header.index),
                msg: String::new(),
            },
            Ok(Err(e)) => {
                warn!(index = header.index, "chunk write failed: {e}");
                ChunkAck {
                    hash: header.hash.clone(),
                    success: false,
                    data: Some(header.index),
                    msg: e.to_string(),
                }
            }
            Err(e) => {
                error!("chunk write task failed: {e}");
                ChunkAck {
                    hash: header.hash.clone(),
                    success: false,
                    data: Some(header.index),
                    msg: "internal error".into(),
                }
            }
        };

        if let Ok(reply) = Message::new(header.id.clone(), MessageType::FileUploaded, Some(&ack)) {
            let _ = sender.send_msg(reply);
        }
    }

    async fn handle_merge(&self, sender: Sender, msg: Message) {
        let req: MergeRequest = match msg.parse_payload() {
            Ok(Some(r)) => r,
            _ => {
                let _ = sender.send_error(&msg, 400, "invalid payload");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let hash = req.hash.clone();
        let merged = tokio::task::spawn_blocking(move || {
            store.merge(&req.hash, req.chunk_size, req.total, &req.name)
        })
        .await;

        // Merge failures ride inside the result payload rather than the
        // envelope error: the uploading side treats them as a terminal
        // task failure, not a protocol fault.
        let result = match merged {
            Ok(Ok(artifact)) => MergeResult {
                hash,
                success: true,
                data: artifact,
                msg: String::new(),
            },
            Ok(Err(e)) => {
                warn!("merge failed: {e}");
                MergeResult {
                    hash,
                    success: false,
                    data: String::new(),
                    msg: e.to_string(),
                }
            }
            Err(e) => {
                error!("merge task failed: {e}");
                MergeResult {
                    hash,
                    success: false,
                    data: String::new(),
                    msg: "internal error".into(),
                }
            }
        };

        if let Ok(reply) = msg.reply(MessageType::FileSuccess, Some(&result)) {
            let _ = sender.send_msg(reply);
        }
    }
}

impl Handler for UploadService {
    fn on_verify(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(self.handle_verify(sender, msg))
    }

    fn on_chunk(&self, sender: Sender, header: ChunkFrameHeader, data: Vec<u8>) -> HandlerFuture<'_> {
        Box::pin(self.handle_chunk(sender, header, data))
    }

    fn on_merge(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(self.handle_merge(sender, msg))
    }
}

fn verify_response(outcome: ProbeOutcome) -> VerifyResponse {
    match outcome {
        ProbeOutcome::Existing { .. } => VerifyResponse {
            status: VerifyStatus::Existing,
            index: None,
        },
        ProbeOutcome::ReadyToMerge => VerifyResponse {
            status: VerifyStatus::Merge,
            index: None,
        },
        ProbeOutcome::Partial { held } => VerifyResponse {
            status: VerifyStatus::Progress,
            index: Some(held),
        },
        ProbeOutcome::Empty => VerifyResponse {
            status: VerifyStatus::Upload,
            index: None,
        },
    }
}

fn error_code(e: &StoreError) -> i32 {
    match e {
        StoreError::Io(_) => 500,
        _ => 400,
    }
}
