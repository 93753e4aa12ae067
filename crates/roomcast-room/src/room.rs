//! Chat rooms: membership and fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use roomcast_protocol::{ChatMessage, MessagePayload, RoomId, SubscriberId};
use tokio::time::Instant;

use crate::{Delivery, RoomError, Subscriber};

/// Membership state guarded by the room lock.
#[derive(Debug)]
struct Members {
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
    /// When the room last became empty. `None` while it has members.
    idle_since: Option<Instant>,
}

/// What a single fan-out did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// `text` copies queued for other members.
    pub delivered: usize,
    /// Copies dropped because a member's inbox was full.
    pub dropped: usize,
    /// Members evicted because their inbox was full.
    pub evicted: usize,
    /// Members skipped because they were already leaving.
    pub skipped: usize,
    /// Whether the `self` echo reached the sender's inbox.
    pub echoed: bool,
}

/// A named group of subscribers.
///
/// Rooms are created by the [`RoomRegistry`](crate::RoomRegistry) and
/// handed out as `Arc<ChatRoom>`. A session may keep using its room after
/// the registry deleted it: fan-out and removal still work, but nobody
/// new can join.
#[derive(Debug)]
pub struct ChatRoom {
    id: RoomId,
    name: String,
    span: tracing::Span,
    members: Mutex<Members>,
}

impl ChatRoom {
    pub(crate) fn new(id: RoomId, name: String, span: tracing::Span) -> Self {
        Self {
            id,
            name,
            span,
            members: Mutex::new(Members {
                subscribers: HashMap::new(),
                idle_since: Some(Instant::now()),
            }),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// The display name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The span this room logs under. Sessions in the room log with it as
    /// their parent.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a subscriber. There is no capacity limit.
    ///
    /// Fails with [`RoomError::AlreadyInRoom`] if the subscriber has ever
    /// joined a room, this one included.
    pub fn add_subscriber(
        &self,
        subscriber: &Arc<Subscriber>,
    ) -> Result<(), RoomError> {
        subscriber
            .bind_room(self.id)
            .map_err(|current| RoomError::AlreadyInRoom(subscriber.id(), current))?;

        let mut members = self.lock();
        members
            .subscribers
            .insert(subscriber.id(), Arc::clone(subscriber));
        members.idle_since = None;

        tracing::info!(
            parent: &self.span,
            subscriber_id = %subscriber.id(),
            display_name = %subscriber.display_name(),
            members = members.subscribers.len(),
            "subscriber joined"
        );
        Ok(())
    }

    /// Removes a subscriber. Idempotent: returns `false` if it was not a
    /// member.
    pub fn remove_subscriber(&self, subscriber_id: SubscriberId) -> bool {
        let mut members = self.lock();
        if members.subscribers.remove(&subscriber_id).is_none() {
            return false;
        }
        if members.subscribers.is_empty() {
            members.idle_since = Some(Instant::now());
        }

        tracing::info!(
            parent: &self.span,
            %subscriber_id,
            members = members.subscribers.len(),
            "subscriber left"
        );
        true
    }

    /// Broadcasts `text` from `sender`.
    ///
    /// Every current member other than the sender gets one `text` copy,
    /// then the sender gets one `self` echo. Members are snapshotted under
    /// the lock; delivery happens after it is released and never waits.
    pub fn fan_out(&self, sender: &Subscriber, text: String) -> FanOutReport {
        let recipients: Vec<Arc<Subscriber>> = self
            .lock()
            .subscribers
            .values()
            .filter(|member| member.id() != sender.id())
            .cloned()
            .collect();

        let payload = MessagePayload {
            sender_id: sender.id(),
            sender_display_name: sender.display_name().clone(),
            text,
        };

        let mut report = FanOutReport::default();
        for member in &recipients {
            match member.deliver(ChatMessage::Text(payload.clone())) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Dropped => {
                    report.dropped += 1;
                    tracing::warn!(
                        parent: &self.span,
                        subscriber_id = %member.id(),
                        "inbox full, message dropped"
                    );
                }
                Delivery::Evicted => report.evicted += 1,
                Delivery::Closed => report.skipped += 1,
            }
        }
        report.echoed = sender.deliver(ChatMessage::SelfEcho(payload)) == Delivery::Queued;

        tracing::debug!(
            parent: &self.span,
            sender_id = %sender.id(),
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "message fanned out"
        );
        report
    }

    /// Number of current members.
    pub fn len(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().subscribers.is_empty()
    }

    pub fn contains(&self, subscriber_id: SubscriberId) -> bool {
        self.lock().subscribers.contains_key(&subscriber_id)
    }

    /// How long the room has been continuously empty, or `None` if it has
    /// members.
    pub fn idle_for(&self) -> Option<Duration> {
        self.lock().idle_since.map(|since| since.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use roomcast_protocol::{DisplayName, MessageKind};

    use super::*;
    use crate::{Inbox, InboxConfig, OverflowPolicy};

    fn room() -> ChatRoom {
        ChatRoom::new(RoomId::generate(), "general".into(), tracing::Span::none())
    }

    fn join(room: &ChatRoom, name: &str) -> (Arc<Subscriber>, Inbox) {
        let (sub, inbox) =
            Subscriber::new(DisplayName::new(name).unwrap(), &InboxConfig::default());
        room.add_subscriber(&sub).unwrap();
        (sub, inbox)
    }

    fn drain(inbox: &mut Inbox) -> Vec<ChatMessage> {
        std::iter::from_fn(|| inbox.try_recv()).collect()
    }

    #[test]
    fn test_new_room_is_empty_and_idle() {
        let room = room();
        assert!(room.is_empty());
        assert_eq!(room.len(), 0);
        assert!(room.idle_for().is_some());
        assert_eq!(room.name(), "general");
    }

    #[test]
    fn test_add_subscriber_clears_idle() {
        let room = room();
        let (alice, _inbox) = join(&room, "alice");
        assert!(room.contains(alice.id()));
        assert_eq!(room.len(), 1);
        assert!(room.idle_for().is_none());
        assert_eq!(alice.room(), Some(room.id()));
    }

    #[test]
    fn test_add_subscriber_twice_fails() {
        let room = room();
        let (alice, _inbox) = join(&room, "alice");
        let result = room.add_subscriber(&alice);
        assert!(matches!(result, Err(RoomError::AlreadyInRoom(id, rid))
            if id == alice.id() && rid == room.id()));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_subscriber_cannot_join_second_room() {
        let first = room();
        let second = room();
        let (alice, _inbox) = join(&first, "alice");

        let result = second.add_subscriber(&alice);
        assert!(matches!(result, Err(RoomError::AlreadyInRoom(_, rid)) if rid == first.id()));
        assert!(second.is_empty());
    }

    #[test]
    fn test_remove_subscriber_is_idempotent() {
        let room = room();
        let (alice, _inbox) = join(&room, "alice");

        assert!(room.remove_subscriber(alice.id()));
        assert!(!room.remove_subscriber(alice.id()));
        assert!(room.is_empty());
        assert!(room.idle_for().is_some());
    }

    #[test]
    fn test_fan_out_text_to_others_self_to_sender() {
        let room = room();
        let (alice, mut alice_inbox) = join(&room, "alice");
        let (_bob, mut bob_inbox) = join(&room, "bob");
        let (_carol, mut carol_inbox) = join(&room, "carol");

        let report = room.fan_out(&alice, r#""hello""#.to_string());
        assert_eq!(report.delivered, 2);
        assert!(report.echoed);

        let alice_msgs = drain(&mut alice_inbox);
        assert_eq!(alice_msgs.len(), 1);
        assert_eq!(alice_msgs[0].kind(), MessageKind::SelfEcho);

        for inbox in [&mut bob_inbox, &mut carol_inbox] {
            let msgs = drain(inbox);
            assert_eq!(msgs.len(), 1);
            assert_eq!(msgs[0].kind(), MessageKind::Text);
            let payload = msgs[0].payload().unwrap();
            assert_eq!(payload.sender_id, alice.id());
            assert_eq!(payload.sender_display_name.as_str(), "alice");
            assert_eq!(payload.text, r#""hello""#);
        }
    }

    #[test]
    fn test_fan_out_alone_only_echoes() {
        let room = room();
        let (alice, mut inbox) = join(&room, "alice");

        let report = room.fan_out(&alice, "1".to_string());
        assert_eq!(report.delivered, 0);
        assert!(report.echoed);
        assert_eq!(drain(&mut inbox).len(), 1);
    }

    #[test]
    fn test_fan_out_skips_removed_member() {
        let room = room();
        let (alice, _a) = join(&room, "alice");
        let (bob, mut bob_inbox) = join(&room, "bob");

        room.remove_subscriber(alice.id());
        let report = room.fan_out(&bob, "2".to_string());
        assert_eq!(report.delivered, 0);
        assert_eq!(drain(&mut bob_inbox).len(), 1);
    }

    #[test]
    fn test_fan_out_counts_closed_member_as_skipped() {
        let room = room();
        let (alice, _a) = join(&room, "alice");
        let (bob, _b) = join(&room, "bob");

        alice.close_inbox();
        let report = room.fan_out(&bob, "3".to_string());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 0);
    }

    #[test]
    fn test_fan_out_evicts_full_member() {
        let room = room();
        let (slow, _slow_inbox) = Subscriber::new(
            DisplayName::new("slow").unwrap(),
            &InboxConfig { capacity: 1, overflow: OverflowPolicy::Disconnect },
        );
        room.add_subscriber(&slow).unwrap();
        let (fast, _fast_inbox) = join(&room, "fast");

        assert_eq!(room.fan_out(&fast, "1".into()).delivered, 1);
        let report = room.fan_out(&fast, "2".into());
        assert_eq!(report.evicted, 1);
        assert!(slow.is_evicted());
    }
}
