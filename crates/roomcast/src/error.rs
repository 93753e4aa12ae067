//! Unified error type for roomcast.

use axum::http::StatusCode;
use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;
use roomcast_session::SessionError;
use roomcast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// A transport-level error (send, recv, close).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (bad identifier, bad display name, codec).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session could not be started.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, already joined).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Binding or serving the HTTP listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoomcastError {
    /// The HTTP status a request failing with this error should get.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Protocol(_) | Self::Session(SessionError::InvalidDisplayName(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Room(RoomError::NotFound(_))
            | Self::Session(SessionError::Room(RoomError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Room(RoomError::AlreadyInRoom(..))
            | Self::Session(SessionError::Room(RoomError::AlreadyInRoom(..))) => {
                StatusCode::CONFLICT
            }
            Self::Transport(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
