//! # roomcast
//!
//! A minimal real-time chat relay. Clients create named rooms over HTTP,
//! join one over a WebSocket, and every text frame they send is fanned out
//! to the other members of the room.
//!
//! The workspace is layered:
//!
//! - `roomcast-transport`: framed connections ([`FramedChannel`])
//! - `roomcast-protocol`: IDs, wire messages, codec
//! - `roomcast-room`: subscribers, rooms, fan-out, registry, idle reaper
//! - `roomcast-session`: per-connection reader/writer loops and teardown
//! - `roomcast` (this crate): the [`ChatRelay`] facade and the HTTP server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn example() -> Result<(), RoomcastError> {
//! let server = RoomcastServer::builder()
//!     .bind("127.0.0.1:3000")
//!     .build()
//!     .await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```
//!
//! [`FramedChannel`]: roomcast_transport::FramedChannel

mod error;
mod handler;
pub mod logger;
mod relay;
mod server;

pub use error::RoomcastError;
pub use relay::ChatRelay;
pub use server::{DEFAULT_BIND, RoomcastServer, RoomcastServerBuilder};

pub use roomcast_protocol as protocol;
pub use roomcast_room as room;
pub use roomcast_session as session;
pub use roomcast_transport as transport;

/// Everything needed to run or embed a relay.
pub mod prelude {
    pub use crate::{ChatRelay, RoomcastError, RoomcastServer, RoomcastServerBuilder};
    pub use roomcast_protocol::{ChatMessage, DisplayName, MessagePayload, RoomId, SubscriberId};
    pub use roomcast_room::{InboxConfig, OverflowPolicy, RoomConfig};
    pub use roomcast_session::{PendingSession, Session, SessionEnd, SessionHandle, SessionState};
    pub use roomcast_transport::{CloseKind, FramedChannel};
}
