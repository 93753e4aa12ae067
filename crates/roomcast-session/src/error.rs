//! Error types for the session layer.

use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;

/// Errors that can occur while starting a session.
///
/// Once a session is running it never fails: how it ended is reported
/// as a [`SessionEnd`](crate::SessionEnd).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The display name was empty. Checked before any room
    /// interaction.
    #[error("invalid display name: {0}")]
    InvalidDisplayName(#[from] ProtocolError),

    /// The room does not exist, or the subscriber could not join it.
    #[error(transparent)]
    Room(#[from] RoomError),
}
