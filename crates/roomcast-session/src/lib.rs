//! Connection sessions for roomcast.
//!
//! A session glues one live connection to one subscriber in one room:
//!
//! 1. **Connecting**: [`PendingSession::new`] validates the display name,
//!    checks the room exists, and builds the subscriber
//! 2. **Active**: [`PendingSession::activate`] joins the room;
//!    [`Session::run`] drives a reader task (frames in, fan-out) and a
//!    writer loop (inbox out, frames)
//! 3. **Closing / Closed**: teardown runs exactly once (close the inbox,
//!    leave the room, close the connection)
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← upgrades the request, provides cancellation
//!     ↕
//! Session (this crate)
//!     ↕
//! Room + Protocol + Transport (below)
//! ```

mod error;
mod session;
mod state;

pub use error::SessionError;
pub use session::{PendingSession, Session, SessionEnd, SessionHandle};
pub use state::SessionState;
