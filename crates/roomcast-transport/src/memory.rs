//! In-process channel pair.
//!
//! [`pair`] returns a [`MemoryChannel`] (the server side, implementing
//! [`FramedChannel`]) and a [`MemoryPeer`] (the client side). The peer
//! can push frames, close with a given status, inject a receive fault,
//! or make the next writes fail. Sessions are driven through this in
//! tests exactly as they would be over a socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use tokio::sync::{Mutex, mpsc};

use crate::{CloseKind, ConnectionId, FramedChannel, TransportError};

/// Something the peer did, as seen by the server side.
#[derive(Debug)]
enum PeerEvent {
    Frame(Vec<u8>),
    Close(CloseKind),
    Fault(String),
}

/// State visible to both halves.
#[derive(Debug, Default)]
struct Shared {
    /// Close status from the peer, set at most once.
    peer_close: OnceLock<CloseKind>,
    /// When set, every `send` fails with this close status.
    failing_writes: StdMutex<Option<CloseKind>>,
    /// Number of times the server side called `close`.
    close_calls: AtomicUsize,
    locally_closed: AtomicBool,
}

/// Server half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryChannel {
    id: ConnectionId,
    events: Mutex<mpsc::UnboundedReceiver<PeerEvent>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shared: Arc<Shared>,
}

/// Client half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    events: mpsc::UnboundedSender<PeerEvent>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    shared: Arc<Shared>,
}

/// Creates a connected channel/peer pair.
pub fn pair() -> (MemoryChannel, MemoryPeer) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());

    let channel = MemoryChannel {
        id: ConnectionId::next(),
        events: Mutex::new(event_rx),
        outbound: out_tx,
        shared: Arc::clone(&shared),
    };
    let peer = MemoryPeer {
        events: event_tx,
        inbound: Mutex::new(out_rx),
        shared,
    };
    (channel, peer)
}

impl FramedChannel for MemoryChannel {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(kind) = self.shared.peer_close.get() {
            return Err(TransportError::Closed(*kind));
        }
        let failing = *self
            .shared
            .failing_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match failing {
            Some(kind) if kind.is_expected() => {
                return Err(TransportError::Closed(kind));
            }
            Some(_) => {
                return Err(TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "injected write failure",
                )));
            }
            None => {}
        }
        if self.shared.locally_closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed(CloseKind::Normal));
        }
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed(CloseKind::Abnormal))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.events.lock().await.recv().await {
            Some(PeerEvent::Frame(data)) => Ok(Some(data)),
            Some(PeerEvent::Close(kind)) => {
                let _ = self.shared.peer_close.set(kind);
                Ok(None)
            }
            Some(PeerEvent::Fault(reason)) => {
                let _ = self.shared.peer_close.set(CloseKind::Abnormal);
                Err(TransportError::ReceiveFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    reason,
                )))
            }
            // Peer dropped without a close handshake.
            None => {
                let _ = self.shared.peer_close.set(CloseKind::Abnormal);
                Err(TransportError::ReceiveFailed(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer dropped without closing",
                )))
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shared.close_calls.fetch_add(1, Ordering::AcqRel);
        self.shared.locally_closed.store(true, Ordering::Release);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// Sends a text frame to the server side.
    pub fn send_text(&self, text: &str) {
        let _ = self.events.send(PeerEvent::Frame(text.as_bytes().to_vec()));
    }

    /// Sends a raw frame to the server side.
    pub fn send_frame(&self, frame: Vec<u8>) {
        let _ = self.events.send(PeerEvent::Frame(frame));
    }

    /// Closes the connection from the peer with the given status.
    pub fn close(&self, kind: CloseKind) {
        let _ = self.events.send(PeerEvent::Close(kind));
    }

    /// Makes the server's next receive fail as if the socket was reset.
    pub fn fault(&self, reason: &str) {
        let _ = self.events.send(PeerEvent::Fault(reason.to_string()));
    }

    /// Makes every subsequent server-side send fail. An expected
    /// `kind` surfaces as [`TransportError::Closed`]; `Abnormal`
    /// surfaces as [`TransportError::SendFailed`].
    pub fn fail_writes(&self, kind: CloseKind) {
        *self
            .shared
            .failing_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(kind);
    }

    /// Waits for the next frame the server sent. Returns `None` once the
    /// server side has been dropped and every frame has been read.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.inbound.lock().await.recv().await
    }

    /// Returns a frame the server already sent, without waiting.
    pub async fn try_recv(&self) -> Option<Vec<u8>> {
        self.inbound.lock().await.try_recv().ok()
    }

    /// Number of times the server side called `close`.
    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::Acquire)
    }

    /// Returns `true` once the server side has closed the connection.
    pub fn is_closed_by_server(&self) -> bool {
        self.shared.locally_closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (channel, peer) = pair();

        peer.send_text("hello from peer");
        let got = channel.recv().await.expect("recv").expect("frame");
        assert_eq!(got, b"hello from peer");

        channel.send(b"hello from server").await.expect("send");
        assert_eq!(peer.recv().await.unwrap(), b"hello from server");
    }

    #[tokio::test]
    async fn test_peer_close_makes_recv_return_none_and_send_fail() {
        let (channel, peer) = pair();

        peer.close(CloseKind::GoingAway);
        assert!(channel.recv().await.expect("recv").is_none());

        let err = channel.send(b"late").await.unwrap_err();
        assert_eq!(err.close_kind(), CloseKind::GoingAway);
    }

    #[tokio::test]
    async fn test_fault_surfaces_as_receive_error() {
        let (channel, peer) = pair();

        peer.fault("reset by peer");
        let err = channel.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::ReceiveFailed(_)));
    }

    #[tokio::test]
    async fn test_fail_writes_abnormal_is_send_failed() {
        let (channel, peer) = pair();

        peer.fail_writes(CloseKind::Abnormal);
        let err = channel.send(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_dropped_peer_is_receive_error() {
        let (channel, peer) = pair();
        drop(peer);
        let err = channel.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::ReceiveFailed(_)));
        assert_eq!(err.close_kind(), CloseKind::Abnormal);
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let (channel, peer) = pair();
        channel.close().await.unwrap();
        channel.close().await.unwrap();
        assert_eq!(peer.close_calls(), 2);
        assert!(peer.is_closed_by_server());
    }
}
