//! WebSocket channel over an upgraded axum connection.

use std::sync::OnceLock;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::{CloseKind, ConnectionId, FramedChannel, TransportError};

/// A [`FramedChannel`] backed by an upgraded axum [`WebSocket`].
///
/// The socket is split so the read half and the write half sit behind
/// separate locks: a reader blocked waiting for the next frame never
/// holds up a concurrent send.
pub struct WebSocketChannel {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    /// Close status observed from the peer, set at most once.
    peer_close: OnceLock<CloseKind>,
}

impl WebSocketChannel {
    /// Wraps an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let id = ConnectionId::next();
        tracing::debug!(%id, "WebSocket channel opened");
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            peer_close: OnceLock::new(),
        }
    }

    fn record_peer_close(&self, kind: CloseKind) {
        let _ = self.peer_close.set(kind);
    }

    fn send_error(&self, e: axum::Error) -> TransportError {
        match self.peer_close.get() {
            Some(kind) => TransportError::Closed(*kind),
            None => TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            )),
        }
    }
}

impl FramedChannel for WebSocketChannel {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(kind) = self.peer_close.get() {
            return Err(TransportError::Closed(*kind));
        }
        // Wire payloads are JSON, so text frames are the normal case.
        let msg = match std::str::from_utf8(frame) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(frame.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| self.send_error(e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    // A close frame without a status is still a deliberate close.
                    let kind = frame
                        .map(|f| CloseKind::from_code(f.code))
                        .unwrap_or(CloseKind::Normal);
                    self.record_peer_close(kind);
                    tracing::debug!(id = %self.id, %kind, "peer sent close frame");
                    return Ok(None);
                }
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    self.record_peer_close(CloseKind::Abnormal);
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
                None => {
                    self.record_peer_close(CloseKind::Abnormal);
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection ended without a close frame",
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if self.peer_close.get().is_none() {
            let frame = CloseFrame {
                code: close_code::NORMAL,
                reason: "Closing the websocket connection".into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                tracing::debug!(id = %self.id, error = %e, "close frame not sent");
            }
        }
        sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
