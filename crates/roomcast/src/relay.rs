//! The relay facade: the three operations the outside world uses.

use std::sync::Arc;

use roomcast_protocol::RoomId;
use roomcast_room::{RoomConfig, RoomRegistry};
use roomcast_session::{PendingSession, Session};
use roomcast_transport::FramedChannel;

use crate::RoomcastError;

/// Entry point to the chat relay core.
///
/// Cheap to clone; every clone shares one [`RoomRegistry`].
#[derive(Debug, Clone)]
pub struct ChatRelay {
    registry: Arc<RoomRegistry>,
}

impl ChatRelay {
    /// Creates a relay with an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            registry: RoomRegistry::new(config),
        }
    }

    /// Wraps an existing registry.
    pub fn with_registry(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Creates a room and returns its ID. Always succeeds.
    pub fn create_room(&self, display_name: impl Into<String>) -> RoomId {
        self.registry.create_room(display_name)
    }

    /// Returns `true` if the room exists.
    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.registry.contains(room_id)
    }

    /// Validates a join request before the connection is upgraded.
    ///
    /// An empty display name is rejected before the room is looked at.
    pub fn prepare_join(
        &self,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<PendingSession, RoomcastError> {
        Ok(PendingSession::new(
            Arc::clone(&self.registry),
            room_id,
            display_name,
        )?)
    }

    /// Joins a room over an already-live connection.
    ///
    /// The returned session is active; drive it with
    /// [`Session::run`].
    pub async fn join<C: FramedChannel>(
        &self,
        room_id: RoomId,
        display_name: &str,
        channel: C,
    ) -> Result<Session<C>, RoomcastError> {
        let pending = self.prepare_join(room_id, display_name)?;
        Ok(pending.activate(channel).await?)
    }
}

impl Default for ChatRelay {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
