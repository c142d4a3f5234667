//! Bridge between `WsClient` and the uploader's `UploadChannel` trait.

use std::future::Future;
use std::pin::Pin;

use gantry_client::WsClient;
use gantry_protocol::constants::MessageType;
use gantry_protocol::envelope::Message;
use gantry_protocol::frame::ChunkFrameHeader;
use gantry_uploader::{UploadChannel, UploadError};

/// Adapts a connected WebSocket client to the transport trait the
/// upload manager drives.
pub(crate) struct ClientBridge {
    client: WsClient,
}

impl ClientBridge {
    pub(crate) fn new(client: WsClient) -> Self {
        Self { client }
    }
}

impl UploadChannel for ClientBridge {
    fn send_request(
        &self,
        msg_type: MessageType,
        payload: &serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
        let payload = payload.clone();
        Box::pin(async move {
            self.client
                .send_request(msg_type, Some(&payload))
                .await
                .map_err(|e| UploadError::Channel(e.to_string()))
        })
    }

    fn send_chunk(
        &self,
        header: &ChunkFrameHeader,
        data: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>> {
        let header = header.clone();
        let data = data.to_vec();
        Box::pin(async move {
            self.client
                .send_chunk(&header, &data)
                .await
                .map_err(|e| UploadError::Channel(e.to_string()))
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.client.close().await;
        })
    }
}
