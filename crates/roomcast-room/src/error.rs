//! Error types for the room layer.

use roomcast_protocol::{RoomId, SubscriberId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or already reaped).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The subscriber is already bound to a room. A subscriber belongs to
    /// at most one room for its whole life.
    #[error("subscriber {0} already in room {1}")]
    AlreadyInRoom(SubscriberId, RoomId),
}
