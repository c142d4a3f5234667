//! Per-connection read/write pumps and the handler-facing [`Sender`].

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use gantry_protocol::constants::{MessageType, WS_PONG_WAIT};
use gantry_protocol::envelope::Message;
use gantry_protocol::frame::parse_chunk_frame;

use crate::handler::Handler;
use crate::{SEND_BUFFER_SIZE, ServerError};

/// Handle for sending messages back to one connected client.
///
/// Sends are queued on the connection's write pump without awaiting, so
/// handlers can fire replies from any context.
#[derive(Clone)]
pub struct Sender {
    write_tx: mpsc::Sender<tungstenite::Message>,
}

impl Sender {
    /// Queues a message for sending.
    pub fn send_msg(&self, msg: Message) -> Result<(), ServerError> {
        let json = serde_json::to_string(&msg)?;
        self.write_tx
            .try_send(tungstenite::Message::Text(json.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ServerError::SendBufferFull,
                mpsc::error::TrySendError::Closed(_) => ServerError::ConnectionClosed,
            })
    }

    /// Queues an error reply for `req`.
    pub fn send_error(&self, req: &Message, code: i32, message: &str) -> Result<(), ServerError> {
        self.send_msg(req.reply_error(code, message))
    }

    /// `true` while the connection's write pump is alive.
    pub fn is_connected(&self) -> bool {
        !self.write_tx.is_closed()
    }
}

/// Runs one client connection to completion.
///
/// The read pump executes inline so that a handler finishes before the
/// next frame is read. Returns once the peer goes away, the pong deadline
/// expires, or `cancel` fires.
pub(crate) async fn run_connection<H>(
    ws_stream: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    cancel: CancellationToken,
) where
    H: Handler,
{
    let (write, read) = ws_stream.split();
    let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(SEND_BUFFER_SIZE);
    let sender = Sender {
        write_tx: write_tx.clone(),
    };

    let write_handle = {
        let cancel = cancel.clone();
        tokio::spawn(write_pump(write, write_rx, cancel))
    };

    read_pump(read, sender, handler.as_ref(), write_tx, &cancel).await;

    handler.on_disconnected().await;
    cancel.cancel();
    let _ = write_handle.await;
    debug!(%peer_addr, "connection finished");
}

/// Reads frames and dispatches them to the handler, one at a time.
///
/// Any incoming frame resets the pong deadline; [`WS_PONG_WAIT`] of
/// silence means the client is gone.
async fn read_pump<S, H>(
    mut read: S,
    sender: Sender,
    handler: &H,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: &CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    H: Handler,
{
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                warn!("pong timeout, closing connection");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                dispatch_text(&text, handler, &sender).await;
                            }
                            tungstenite::Message::Binary(data) => {
                                dispatch_binary(&data, handler, &sender).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("received close frame");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Routes a parsed text envelope to the matching handler method.
async fn dispatch_text<H: Handler>(text: &str, handler: &H, sender: &Sender) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    match msg.msg_type {
        MessageType::FileVerify => handler.on_verify(sender.clone(), msg).await,
        MessageType::FileMerge => handler.on_merge(sender.clone(), msg).await,
        MessageType::Ping => handler.on_ping(sender.clone(), msg).await,
        MessageType::FileUpload => {
            let _ = sender.send_error(&msg, 400, "chunk uploads travel as binary frames");
        }
        _ => {
            let _ = sender.send_error(&msg, 501, "not implemented");
        }
    }
}

/// Parses a binary chunk frame and hands it to the handler.
async fn dispatch_binary<H: Handler>(data: &[u8], handler: &H, sender: &Sender) {
    match parse_chunk_frame(data) {
        Ok((header, bytes)) => {
            trace!(id = %header.id, index = header.index, "received chunk frame");
            handler.on_chunk(sender.clone(), header, bytes).await;
        }
        Err(e) => {
            warn!("invalid binary frame: {e}");
        }
    }
}

/// Writes queued messages to the WebSocket until cancelled.
async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
pub(crate) fn test_sender(capacity: usize) -> (Sender, mpsc::Receiver<tungstenite::Message>) {
    let (write_tx, write_rx) = mpsc::channel(capacity);
    (Sender { write_tx }, write_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{sink, stream};

    #[tokio::test]
    async fn sender_queues_text_message() {
        let (sender, mut rx) = test_sender(4);

        let msg = Message::new::<()>("m1", MessageType::Pong, None).unwrap();
        sender.send_msg(msg).unwrap();

        let queued = rx.recv().await.unwrap();
        match queued {
            tungstenite::Message::Text(text) => {
                let parsed: Message = serde_json::from_str(&text).unwrap();
                assert_eq!(parsed.id, "m1");
                assert_eq!(parsed.msg_type, MessageType::Pong);
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sender_reports_full_buffer() {
        let (sender, _rx) = test_sender(1);

        let msg = Message::new::<()>("m1", MessageType::Pong, None).unwrap();
        sender.send_msg(msg.clone()).unwrap();
        let result = sender.send_msg(msg);
        assert!(matches!(result, Err(ServerError::SendBufferFull)));
    }

    #[tokio::test]
    async fn sender_reports_closed_connection() {
        let (sender, rx) = test_sender(4);
        drop(rx);

        assert!(!sender.is_connected());
        let msg = Message::new::<()>("m1", MessageType::Pong, None).unwrap();
        let result = sender.send_msg(msg);
        assert!(matches!(result, Err(ServerError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn write_pump_sends_close_on_cancel() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let cancel = CancellationToken::new();

        let sink = sink::unfold(sink_tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        });
        let sink = Box::pin(sink);

        let (_write_tx, write_rx) = mpsc::channel(16);
        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            write_pump(sink, write_rx, c).await;
        });

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        let close_msg = sink_rx.recv().await;
        assert!(matches!(close_msg, Some(tungstenite::Message::Close(_))));
    }

    #[tokio::test]
    async fn read_pump_times_out_on_silence() {
        tokio::time::pause();

        struct NopHandler;
        impl Handler for NopHandler {}

        let (sender, _rx) = test_sender(4);
        let (write_tx, _write_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let silent = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        // Completes only because the pong deadline fires under paused time.
        read_pump(
            Box::pin(silent),
            sender,
            &NopHandler,
            write_tx,
            &cancel,
        )
        .await;
    }

    #[tokio::test]
    async fn read_pump_replies_pong_to_protocol_ping() {
        struct NopHandler;
        impl Handler for NopHandler {}

        let (sender, _rx) = test_sender(4);
        let (write_tx, mut write_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let frames = stream::iter(vec![Ok(tungstenite::Message::Ping(vec![1, 2].into()))]);
        read_pump(Box::pin(frames), sender, &NopHandler, write_tx, &cancel).await;

        let reply = write_rx.recv().await.unwrap();
        match reply {
            tungstenite::Message::Pong(data) => assert_eq!(data.as_ref(), &[1, 2]),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_text_replies_501_for_unknown_type() {
        struct NopHandler;
        impl Handler for NopHandler {}

        let (sender, mut rx) = test_sender(4);
        let json = r#"{"id":"x-1","type":"file/preview"}"#;
        dispatch_text(json, &NopHandler, &sender).await;

        let reply = rx.recv().await.unwrap();
        let parsed: Message = match reply {
            tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(parsed.id, "x-1");
        assert_eq!(parsed.error.unwrap().code, 501);
    }

    #[tokio::test]
    async fn dispatch_text_rejects_text_chunk_upload() {
        struct NopHandler;
        impl Handler for NopHandler {}

        let (sender, mut rx) = test_sender(4);
        let json = r#"{"id":"x-2","type":"file/upload"}"#;
        dispatch_text(json, &NopHandler, &sender).await;

        let reply = rx.recv().await.unwrap();
        let parsed: Message = match reply {
            tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(parsed.error.unwrap().code, 400);
    }

    #[tokio::test]
    async fn dispatch_binary_drops_malformed_frame() {
        struct PanicHandler;
        impl Handler for PanicHandler {
            fn on_chunk(
                &self,
                _sender: Sender,
                _header: gantry_protocol::ChunkFrameHeader,
                _data: Vec<u8>,
            ) -> crate::HandlerFuture<'_> {
                panic!("malformed frame must not reach the handler");
            }
        }

        let (sender, _rx) = test_sender(4);
        dispatch_binary(b"junk", &PanicHandler, &sender).await;
    }
}
