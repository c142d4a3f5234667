//! Transport abstraction for the upload pipeline.

use std::future::Future;
use std::pin::Pin;

use gantry_protocol::envelope::Message;
use gantry_protocol::frame::ChunkFrameHeader;

use crate::error::UploadError;

/// Abstract connection to an upload gateway.
///
/// The calling app implements this trait on top of `WsClient`. Using a
/// trait keeps upload logic decoupled from transport and testable with
/// mocks.
pub trait UploadChannel: Send + Sync {
    /// Sends a JSON request and waits for the reply.
    fn send_request(
        &self,
        msg_type: gantry_protocol::constants::MessageType,
        payload: &serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>>;

    /// Sends one chunk as a binary frame and waits for the ack.
    fn send_chunk(
        &self,
        header: &ChunkFrameHeader,
        data: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<Message, UploadError>> + Send + '_>>;

    /// Closes the underlying transport.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
