//! Handler trait for processing WebSocket messages.
//!
//! Implementors provide the upload logic (verify, chunk persistence,
//! merge) while the server framework handles connection management,
//! routing, and the binary protocol.

use std::future::Future;
use std::pin::Pin;

use gantry_protocol::envelope::Message;
use gantry_protocol::frame::ChunkFrameHeader;

use crate::connection::Sender;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Trait for handling WebSocket messages from an uploading client.
///
/// The server dispatches parsed messages to the appropriate method. Each
/// method receives:
/// - `sender`: channel to send responses back to the client
/// - `msg`: the parsed JSON envelope (for text) or chunk frame (for binary)
///
/// Default implementations reply with "not implemented" so handlers only
/// need to override the message types they care about.
pub trait Handler: Send + Sync + 'static {
    /// Called for `file/verify`.
    fn on_verify(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, 501, "not implemented");
        })
    }

    /// Called for a binary chunk frame (`file/upload`).
    fn on_chunk(&self, sender: Sender, header: ChunkFrameHeader, data: Vec<u8>) -> HandlerFuture<'_> {
        let _ = data;
        Box::pin(async move {
            let _ = sender.send_msg(Message::error(&header.id, 501, "not implemented"));
        })
    }

    /// Called for `file/merge`.
    fn on_merge(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, 501, "not implemented");
        })
    }

    /// Called for `ping` messages.
    fn on_ping(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Ok(reply) = msg.reply(gantry_protocol::MessageType::Pong, Option::<&()>::None) {
                let _ = sender.send_msg(reply);
            }
        })
    }

    /// Called when the client disconnects (cleanup hook).
    fn on_disconnected(&self) -> HandlerFuture<'_> {
        Box::pin(async {})
    }
}
