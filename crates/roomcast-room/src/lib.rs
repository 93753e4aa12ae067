//! Rooms and subscribers for roomcast.
//!
//! A [`RoomRegistry`] maps room IDs to [`ChatRoom`]s and reaps rooms that
//! have stayed empty for a grace period. A [`ChatRoom`] owns its
//! membership and fans each text message out to every member's inbox.
//! A [`Subscriber`] is one connected client: the room enqueues into it,
//! the session drains its [`Inbox`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, looks up, deletes, and reaps rooms
//! - [`ChatRoom`]: membership and fan-out
//! - [`Subscriber`] / [`Inbox`]: the two ends of a bounded message queue
//! - [`RoomConfig`]: reaper timing and inbox settings
//!
//! # Locking
//!
//! The registry map and each room's membership map have their own locks.
//! When both are needed the registry lock is taken first. No lock is held
//! across an `.await` or while enqueueing.

mod config;
mod error;
mod reaper;
mod registry;
mod room;
mod subscriber;

pub use config::{InboxConfig, OverflowPolicy, RoomConfig};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{ChatRoom, FanOutReport};
pub use subscriber::{Delivery, Inbox, Subscriber};
