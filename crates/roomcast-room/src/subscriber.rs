//! Subscribers and their inboxes.
//!
//! [`Subscriber::new`] returns both ends of a bounded queue: the shared
//! [`Subscriber`] that rooms enqueue into, and the [`Inbox`] that exactly
//! one session writer drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use roomcast_protocol::{ChatMessage, DisplayName, RoomId, SubscriberId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::{InboxConfig, OverflowPolicy};

/// The outcome of a single non-blocking delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message is in the subscriber's inbox.
    Queued,
    /// The inbox was full and the message was dropped for this subscriber.
    Dropped,
    /// The inbox was full and the subscriber has been evicted.
    Evicted,
    /// The subscriber's inbox is closed; it is leaving.
    Closed,
}

/// One connected client, as seen by the room it belongs to.
///
/// Shared between the room (which enqueues) and the session (which owns
/// the matching [`Inbox`]). All methods take `&self`.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    display_name: DisplayName,
    tx: mpsc::Sender<ChatMessage>,
    overflow: OverflowPolicy,
    /// Set once the inbox stops accepting messages.
    closed: AtomicBool,
    /// Set when the overflow policy evicted this subscriber.
    evicted: AtomicBool,
    /// Cancelled on close or eviction; wakes the session writer.
    shutdown: CancellationToken,
    /// The one room this subscriber may ever join.
    room: OnceLock<RoomId>,
}

impl Subscriber {
    /// Creates a subscriber with a fresh ID and an empty inbox.
    pub fn new(
        display_name: DisplayName,
        config: &InboxConfig,
    ) -> (Arc<Self>, Inbox) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let subscriber = Arc::new(Self {
            id: SubscriberId::generate(),
            display_name,
            tx,
            overflow: config.overflow,
            closed: AtomicBool::new(false),
            evicted: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            room: OnceLock::new(),
        });
        (subscriber, Inbox { rx })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// The room this subscriber joined, if any.
    pub fn room(&self) -> Option<RoomId> {
        self.room.get().copied()
    }

    /// Binds this subscriber to `room_id`. Fails with the already-bound
    /// room if there is one.
    pub(crate) fn bind_room(&self, room_id: RoomId) -> Result<(), RoomId> {
        self.room.set(room_id).map_err(|_| self.room().unwrap_or(room_id))
    }

    /// Enqueues `msg` without waiting.
    ///
    /// A full inbox is handled according to the subscriber's
    /// [`OverflowPolicy`].
    pub fn deliver(&self, msg: ChatMessage) -> Delivery {
        if self.closed.load(Ordering::Acquire) {
            return Delivery::Closed;
        }
        match self.tx.try_send(msg) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
            Err(TrySendError::Full(_)) => match self.overflow {
                OverflowPolicy::DropNewest => Delivery::Dropped,
                OverflowPolicy::Disconnect => {
                    self.evict();
                    Delivery::Evicted
                }
            },
        }
    }

    /// Enqueues the terminate sentinel, waiting for room if the inbox is
    /// full. Does nothing once the inbox is closed.
    pub async fn terminate(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        // Fails only when the inbox has already been dropped.
        let _ = self.tx.send(ChatMessage::Terminate).await;
    }

    /// Stops accepting messages and wakes the writer.
    ///
    /// Returns `true` for the call that actually closed the inbox.
    pub fn close_inbox(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.shutdown.cancel();
        first
    }

    fn evict(&self) {
        if !self.evicted.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                subscriber_id = %self.id,
                display_name = %self.display_name,
                "inbox full, evicting subscriber"
            );
        }
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();
    }

    /// Returns `true` once the inbox is closed (by teardown or eviction).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if the overflow policy evicted this subscriber.
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    /// Completes once the inbox is closed or the subscriber is evicted.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }
}

/// The receiving end of a subscriber's queue.
///
/// Owned by exactly one session writer.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<ChatMessage>,
}

impl Inbox {
    /// Waits for the next message. Returns `None` once the inbox is
    /// closed and drained.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }

    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<ChatMessage> {
        self.rx.try_recv().ok()
    }

    /// Stops the queue from accepting new messages. Already-queued
    /// messages can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
