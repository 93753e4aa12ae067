//! Session types: the glue between one connection and one subscriber.
//!
//! A [`Session`] owns the subscriber's [`Inbox`] and the connection. When
//! run it spawns a reader task and acts as the writer itself:
//!
//! ```text
//!   connection ──recv──→ reader ──fan_out──→ room ──deliver──→ inboxes
//!   connection ←─send─── writer ←──recv───── own inbox
//! ```
//!
//! Whichever side finishes first, teardown runs exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use roomcast_protocol::{ChatMessage, Codec, DisplayName, JsonCodec, RoomId, SubscriberId};
use roomcast_room::{ChatRoom, Inbox, RoomRegistry, Subscriber};
use roomcast_transport::FramedChannel;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{SessionError, SessionState};

// ---------------------------------------------------------------------------
// SessionEnd
// ---------------------------------------------------------------------------

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Receiving from the connection failed.
    TransportLost,
    /// The peer closed the connection, either while we were reading or
    /// with a normal or going-away status while we were writing.
    PeerClosed,
    /// Writing to the connection failed unexpectedly.
    WriteFailed,
    /// The external cancellation signal fired, or the session was torn
    /// down through a [`SessionHandle`].
    Cancelled,
    /// The subscriber was evicted because its inbox overflowed.
    Disconnected,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportLost => write!(f, "transport lost"),
            Self::PeerClosed => write!(f, "peer closed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

// ---------------------------------------------------------------------------
// PendingSession
// ---------------------------------------------------------------------------

/// A session in the `Connecting` state: the subscriber exists but has
/// not joined its room.
///
/// Created before the connection upgrade, so bad requests are rejected
/// without touching the room. Finish with [`activate`](Self::activate)
/// once the connection is live, or [`abort`](Self::abort) if the upgrade
/// failed.
#[derive(Debug)]
pub struct PendingSession {
    registry: Arc<RoomRegistry>,
    room: Arc<ChatRoom>,
    subscriber: Arc<Subscriber>,
    inbox: Inbox,
    state: watch::Sender<SessionState>,
}

impl PendingSession {
    /// Validates `display_name`, checks that the room exists, and builds
    /// the subscriber.
    ///
    /// # Errors
    /// - [`SessionError::InvalidDisplayName`] for an empty name
    /// - [`SessionError::Room`] if the room does not exist
    pub fn new(
        registry: Arc<RoomRegistry>,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<Self, SessionError> {
        let display_name = DisplayName::new(display_name)?;
        let room = registry.lookup(&room_id)?;
        let (subscriber, inbox) =
            Subscriber::new(display_name, &registry.config().inbox);
        let (state, _) = watch::channel(SessionState::Connecting);

        Ok(Self {
            registry,
            room,
            subscriber,
            inbox,
            state,
        })
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    pub fn room_id(&self) -> RoomId {
        self.room.id()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Joins the room and returns the running-ready session.
    ///
    /// If the room was deleted since [`new`](Self::new), the connection is
    /// closed and the session ends in `Closed`.
    pub async fn activate<C: FramedChannel>(
        self,
        channel: C,
    ) -> Result<Session<C>, SessionError> {
        let span = tracing::info_span!(
            parent: self.room.span(),
            "session",
            subscriber_id = %self.subscriber.id(),
            conn_id = %channel.id()
        );

        let room = match self.registry.join(&self.room.id(), &self.subscriber) {
            Ok(room) => room,
            Err(e) => {
                tracing::info!(parent: &span, error = %e, "join failed, closing connection");
                if let Err(close_err) = channel.close().await {
                    tracing::debug!(parent: &span, error = %close_err, "close after failed join");
                }
                self.state.send_replace(SessionState::Closed);
                return Err(e.into());
            }
        };

        self.state.send_replace(SessionState::Active);
        Ok(Session {
            shared: Arc::new(Shared {
                channel,
                subscriber: self.subscriber,
                room,
                span,
                state: self.state,
                torn_down: AtomicBool::new(false),
                read_end: OnceLock::new(),
            }),
            inbox: self.inbox,
            codec: JsonCodec,
        })
    }

    /// Gives up on a session whose connection never came up.
    ///
    /// The subscriber never joined the room, so there is nothing to tear
    /// down. Logged at error level; only this connection attempt fails.
    pub fn abort(self, reason: impl fmt::Display) -> SessionState {
        tracing::error!(
            parent: self.room.span(),
            subscriber_id = %self.subscriber.id(),
            %reason,
            "connection upgrade failed"
        );
        self.subscriber.close_inbox();
        self.state.send_replace(SessionState::Closed);
        SessionState::Closed
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State shared by the reader task, the writer, and every handle.
struct Shared<C> {
    channel: C,
    subscriber: Arc<Subscriber>,
    room: Arc<ChatRoom>,
    span: tracing::Span,
    state: watch::Sender<SessionState>,
    torn_down: AtomicBool,
    /// How the reader stopped, if it stopped on its own.
    read_end: OnceLock<SessionEnd>,
}

/// An active session, ready to [`run`](Self::run).
///
/// A session must be run: the subscriber stays in its room until
/// teardown, and teardown is driven from `run` (or a [`SessionHandle`]).
pub struct Session<C: FramedChannel> {
    shared: Arc<Shared<C>>,
    inbox: Inbox,
    codec: JsonCodec,
}

impl<C: FramedChannel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subscriber_id", &self.shared.subscriber.id())
            .field("room_id", &self.shared.room.id())
            .field("conn_id", &self.shared.channel.id())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<C: FramedChannel> Session<C> {
    /// Returns a handle for observing or tearing down this session from
    /// another task.
    pub fn handle(&self) -> SessionHandle<C> {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.shared.subscriber.id()
    }

    pub fn room_id(&self) -> RoomId {
        self.shared.room.id()
    }

    /// Runs the session to completion.
    ///
    /// Spawns the reader task, runs the writer loop on the current task
    /// until it stops, tears the session down, and waits for the reader.
    pub async fn run(self, cancel: CancellationToken) -> SessionEnd {
        let Self {
            shared,
            mut inbox,
            codec,
        } = self;

        tracing::debug!(parent: &shared.span, "session started");
        let reader = tokio::spawn(read_loop(Arc::clone(&shared), codec));

        let end = write_loop(&shared, &mut inbox, &codec, &cancel).await;

        inbox.close();
        shared.teardown().await;

        if let Err(e) = reader.await {
            tracing::error!(parent: &shared.span, error = %e, "reader task failed");
        }

        tracing::info!(
            parent: &shared.span,
            display_name = %shared.subscriber.display_name(),
            reason = %end,
            "session closed"
        );
        end
    }
}

impl<C: FramedChannel> Shared<C> {
    fn transition(&self, to: SessionState) {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                *current = to;
                true
            } else {
                tracing::warn!(
                    parent: &self.span,
                    from = %current,
                    %to,
                    "invalid session state transition"
                );
                false
            }
        });
    }

    /// Closes the inbox, leaves the room, and closes the connection.
    /// Only the first call does anything; later calls wait until it has
    /// finished.
    async fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            let mut state = self.state.subscribe();
            let _ = state.wait_for(|s| s.is_terminal()).await;
            return false;
        }
        self.transition(SessionState::Closing);

        self.subscriber.close_inbox();
        self.room.remove_subscriber(self.subscriber.id());
        if let Err(e) = self.channel.close().await {
            tracing::debug!(parent: &self.span, error = %e, "close failed");
        }

        self.transition(SessionState::Closed);
        true
    }
}

/// Reads frames until the connection ends or the session is torn down.
async fn read_loop<C: FramedChannel>(shared: Arc<Shared<C>>, codec: JsonCodec) {
    let end = loop {
        let frame = tokio::select! {
            _ = shared.subscriber.closed() => return,
            frame = shared.channel.recv() => frame,
        };

        match frame {
            Ok(Some(data)) => {
                if !codec.is_well_formed(&data) {
                    tracing::debug!(parent: &shared.span, len = data.len(), "dropping non-JSON frame");
                    continue;
                }
                let Ok(text) = String::from_utf8(data) else {
                    tracing::debug!(parent: &shared.span, "dropping non-UTF-8 frame");
                    continue;
                };
                shared.room.fan_out(&shared.subscriber, text);
            }
            Ok(None) => break SessionEnd::PeerClosed,
            Err(e) => {
                tracing::debug!(parent: &shared.span, error = %e, "receive failed");
                break SessionEnd::TransportLost;
            }
        }
    };

    let _ = shared.read_end.set(end);
    shared.subscriber.terminate().await;
}

/// Drains the inbox onto the connection until told to stop.
async fn write_loop<C: FramedChannel>(
    shared: &Shared<C>,
    inbox: &mut Inbox,
    codec: &impl Codec,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            _ = shared.subscriber.closed() => {
                return if shared.subscriber.is_evicted() {
                    SessionEnd::Disconnected
                } else {
                    SessionEnd::Cancelled
                };
            }
            msg = inbox.recv() => msg,
        };

        let msg = match msg {
            Some(ChatMessage::Terminate) | None => {
                return shared
                    .read_end
                    .get()
                    .copied()
                    .unwrap_or(SessionEnd::TransportLost);
            }
            Some(msg) => msg,
        };

        let frame = match codec.encode(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(parent: &shared.span, error = %e, "failed to encode message, skipping");
                continue;
            }
        };

        if let Err(e) = shared.channel.send(&frame).await {
            let kind = e.close_kind();
            if kind.is_expected() {
                tracing::debug!(parent: &shared.span, %kind, "peer gone while writing");
                return SessionEnd::PeerClosed;
            }
            tracing::error!(parent: &shared.span, error = %e, "write failed");
            return SessionEnd::WriteFailed;
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A cloneable handle to a running session.
pub struct SessionHandle<C: FramedChannel> {
    shared: Arc<Shared<C>>,
}

impl<C: FramedChannel> Clone for SessionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: FramedChannel> fmt::Debug for SessionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("subscriber_id", &self.shared.subscriber.id())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<C: FramedChannel> SessionHandle<C> {
    /// Tears the session down: close the inbox, leave the room, close the
    /// connection.
    ///
    /// Safe to call from any task, any number of times, concurrently with
    /// the session's own teardown. Returns `true` only for the call that
    /// actually did the work. Every call returns once the session is
    /// `Closed`.
    pub async fn teardown(&self) -> bool {
        self.shared.teardown().await
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.shared.subscriber.id()
    }

    pub fn room_id(&self) -> RoomId {
        self.shared.room.id()
    }
}
