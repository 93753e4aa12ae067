//! Room registry: creates, tracks, and reaps rooms.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use roomcast_protocol::RoomId;

use crate::reaper::spawn_reaper;
use crate::{ChatRoom, RoomConfig, RoomError, Subscriber};

/// What the reaper found when it checked a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReapOutcome {
    /// The room was empty for the whole grace period and is now deleted.
    Reaped,
    /// The room has members, or has not been empty long enough.
    Busy,
    /// The room is no longer in the registry.
    Gone,
}

/// Process-wide map from room ID to room.
///
/// This is the entry point for room operations from higher layers (the
/// session layer and the HTTP server). Every room gets an idle reaper
/// when it is created; see [`RoomConfig`] for its timing.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<ChatRoom>>>,
    config: RoomConfig,
    span: tracing::Span,
}

impl RoomRegistry {
    /// Creates an empty registry that logs under a fresh `room_registry`
    /// span.
    pub fn new(config: RoomConfig) -> Arc<Self> {
        Self::with_span(config, tracing::info_span!("room_registry"))
    }

    /// Creates an empty registry that logs under `span`. Each room logs
    /// under a child of it.
    pub fn with_span(config: RoomConfig, span: tracing::Span) -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            span,
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RoomId, Arc<ChatRoom>>> {
        self.rooms
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, Arc<ChatRoom>>> {
        self.rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates an empty room, starts its idle reaper, and returns its ID.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_room(self: &Arc<Self>, name: impl Into<String>) -> RoomId {
        let room_id = RoomId::generate();
        let name = name.into();
        let span = tracing::info_span!(
            parent: &self.span,
            "room",
            room_id = %room_id,
            room_name = %name
        );
        let room = Arc::new(ChatRoom::new(room_id, name, span));

        self.write().insert(room_id, Arc::clone(&room));
        tracing::info!(parent: room.span(), "room created");

        spawn_reaper(
            Arc::downgrade(self),
            room_id,
            self.config.effective_reap_interval(),
            self.config.idle_grace,
        );
        room_id
    }

    /// Looks up a room.
    pub fn lookup(&self, room_id: &RoomId) -> Result<Arc<ChatRoom>, RoomError> {
        self.read()
            .get(room_id)
            .cloned()
            .ok_or(RoomError::NotFound(*room_id))
    }

    /// Returns `true` if the room exists.
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.read().contains_key(room_id)
    }

    /// Removes a room from the registry. Idempotent: returns `false` if it
    /// was already gone.
    ///
    /// Sessions that still hold the room keep working; their members are
    /// not disconnected.
    pub fn delete_room(&self, room_id: &RoomId) -> bool {
        let removed = self.write().remove(room_id);
        match removed {
            Some(room) => {
                tracing::info!(parent: room.span(), members = room.len(), "room deleted");
                true
            }
            None => false,
        }
    }

    /// Adds `subscriber` to a room and returns the room.
    ///
    /// The registry read lock is held while the subscriber is added, so a
    /// join can never land in a room the reaper is removing.
    pub fn join(
        &self,
        room_id: &RoomId,
        subscriber: &Arc<Subscriber>,
    ) -> Result<Arc<ChatRoom>, RoomError> {
        let rooms = self.read();
        let room = rooms.get(room_id).ok_or(RoomError::NotFound(*room_id))?;
        room.add_subscriber(subscriber)?;
        Ok(Arc::clone(room))
    }

    /// Deletes the room if it has been empty for at least `grace`.
    pub(crate) fn reap_if_idle(&self, room_id: &RoomId, grace: Duration) -> ReapOutcome {
        let mut rooms = self.write();
        let Some(room) = rooms.get(room_id) else {
            return ReapOutcome::Gone;
        };
        match room.idle_for() {
            Some(idle) if idle >= grace => {
                if let Some(room) = rooms.remove(room_id) {
                    tracing::info!(
                        parent: room.span(),
                        idle_secs = idle.as_secs(),
                        "idle room reaped"
                    );
                }
                ReapOutcome::Reaped
            }
            _ => ReapOutcome::Busy,
        }
    }

    /// Number of rooms in the registry.
    pub fn room_count(&self) -> usize {
        self.read().len()
    }
}
