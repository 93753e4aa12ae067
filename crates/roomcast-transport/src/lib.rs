//! Transport abstraction layer for roomcast.
//!
//! The relay core never accepts sockets itself. An outer layer (the HTTP
//! server in the `roomcast` crate) upgrades an incoming request and hands
//! the core a live [`FramedChannel`]: something that can send and receive
//! whole frames and close itself with a normal status.
//!
//! # Feature Flags
//!
//! - `test-util`: the `memory` module, an in-process channel pair that
//!   behaves like a connection, used to drive sessions without a network
//! - `websocket` (default): [`WebSocketChannel`], an adapter over axum's
//!   WebSocket

mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique connection ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a connection was closed, as far as the relay cares.
///
/// WebSocket close codes 1000 (normal closure) and 1001 (going away) are
/// the expected ways for a client to leave. Everything else, including
/// a connection that vanished without a close frame, is abnormal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// The peer closed with status 1000.
    Normal,
    /// The peer closed with status 1001 (page navigated away, app quit).
    GoingAway,
    /// Any other status, or no close handshake at all.
    Abnormal,
}

impl CloseKind {
    /// WebSocket status code for a normal closure.
    pub const NORMAL_CODE: u16 = 1000;
    /// WebSocket status code for "going away".
    pub const GOING_AWAY_CODE: u16 = 1001;

    /// Maps a WebSocket close status code to a `CloseKind`.
    pub fn from_code(code: u16) -> Self {
        match code {
            Self::NORMAL_CODE => Self::Normal,
            Self::GOING_AWAY_CODE => Self::GoingAway,
            _ => Self::Abnormal,
        }
    }

    /// Returns `true` for the close statuses a client uses to leave on
    /// purpose.
    pub fn is_expected(self) -> bool {
        matches!(self, Self::Normal | Self::GoingAway)
    }
}

impl fmt::Display for CloseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal closure"),
            Self::GoingAway => write!(f, "going away"),
            Self::Abnormal => write!(f, "abnormal closure"),
        }
    }
}

/// A live, framed, bidirectional connection to one client.
///
/// All methods take `&self` so one task can block in [`recv`](Self::recv)
/// while another task sends. The returned futures are `Send` so sessions
/// can drive them from spawned Tokio tasks.
pub trait FramedChannel: Send + Sync + 'static {
    /// Sends one frame to the peer.
    ///
    /// Fails with [`TransportError::Closed`] when the peer has already
    /// closed the connection, carrying the peer's close status.
    fn send(
        &self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection with a close
    /// handshake. A connection that ends without one is an error.
    /// Control frames (ping/pong) are handled internally and never
    /// surface here.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection with a normal-closure status.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }

    #[test]
    fn test_close_kind_from_code() {
        assert_eq!(CloseKind::from_code(1000), CloseKind::Normal);
        assert_eq!(CloseKind::from_code(1001), CloseKind::GoingAway);
        assert_eq!(CloseKind::from_code(1006), CloseKind::Abnormal);
        assert_eq!(CloseKind::from_code(4000), CloseKind::Abnormal);
    }

    #[test]
    fn test_close_kind_is_expected() {
        assert!(CloseKind::Normal.is_expected());
        assert!(CloseKind::GoingAway.is_expected());
        assert!(!CloseKind::Abnormal.is_expected());
    }
}
