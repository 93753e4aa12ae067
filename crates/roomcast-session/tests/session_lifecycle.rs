//! Integration tests for connection sessions, driven over the in-memory
//! channel pair.

use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::RoomId;
use roomcast_room::{InboxConfig, OverflowPolicy, RoomConfig, RoomError, RoomRegistry};
use roomcast_session::{PendingSession, SessionEnd, SessionError, SessionHandle, SessionState};
use roomcast_transport::CloseKind;
use roomcast_transport::memory::{self, MemoryChannel, MemoryPeer};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(2);

/// A running session plus everything a test needs to poke at it.
struct Client {
    peer: MemoryPeer,
    handle: SessionHandle<MemoryChannel>,
    cancel: CancellationToken,
    task: JoinHandle<SessionEnd>,
}

impl Client {
    async fn next_frame(&self) -> Value {
        let frame = tokio::time::timeout(WAIT, self.peer.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed");
        serde_json::from_slice(&frame).expect("frames are JSON")
    }

    async fn end(self) -> (SessionEnd, MemoryPeer) {
        let end = tokio::time::timeout(WAIT, self.task)
            .await
            .expect("session should finish")
            .expect("session task should not panic");
        (end, self.peer)
    }
}

fn registry_with(inbox: InboxConfig) -> (Arc<RoomRegistry>, RoomId) {
    let registry = RoomRegistry::new(RoomConfig {
        inbox,
        ..RoomConfig::default()
    });
    let room_id = registry.create_room("general");
    (registry, room_id)
}

async fn connect(registry: &Arc<RoomRegistry>, room_id: RoomId, name: &str) -> Client {
    let pending = PendingSession::new(Arc::clone(registry), room_id, name).unwrap();
    let (channel, peer) = memory::pair();
    let session = pending.activate(channel).await.unwrap();
    let handle = session.handle();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(session.run(cancel.clone()));
    Client {
        peer,
        handle,
        cancel,
        task,
    }
}

fn members(registry: &RoomRegistry, room_id: RoomId) -> usize {
    registry.lookup(&room_id).unwrap().len()
}

// =========================================================================
// Fan-out over sessions
// =========================================================================

#[tokio::test]
async fn test_alice_and_bob_exchange_hello() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;

    alice.peer.send_text(r#""hello""#);

    let echo = alice.next_frame().await;
    assert_eq!(echo["type"], "self");
    assert_eq!(echo["payload"]["senderDisplayName"], "alice");
    assert_eq!(echo["payload"]["text"], r#""hello""#);

    let text = bob.next_frame().await;
    assert_eq!(text["type"], "text");
    assert_eq!(text["payload"]["senderId"], alice.handle.subscriber_id().to_string());
    assert_eq!(text["payload"]["text"], r#""hello""#);

    // Exactly one copy each.
    tokio::task::yield_now().await;
    assert!(alice.peer.try_recv().await.is_none());
    assert!(bob.peer.try_recv().await.is_none());
}

#[tokio::test]
async fn test_non_json_frame_is_dropped() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;

    alice.peer.send_text("hello");
    alice.peer.send_frame(vec![0xff, 0x00]);
    alice.peer.send_text(r#"{"text":"ok"}"#);

    let text = bob.next_frame().await;
    assert_eq!(text["payload"]["text"], r#"{"text":"ok"}"#);
    assert_eq!(alice.next_frame().await["type"], "self");
    assert!(bob.peer.try_recv().await.is_none());
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_peer_close_removes_subscriber() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;
    assert_eq!(members(&registry, room_id), 2);

    alice.peer.close(CloseKind::Normal);
    let alice_handle = alice.handle.clone();
    let (end, alice_peer) = alice.end().await;

    assert_eq!(end, SessionEnd::PeerClosed);
    assert_eq!(alice_handle.state(), SessionState::Closed);
    assert_eq!(alice_peer.close_calls(), 1);
    assert_eq!(members(&registry, room_id), 1);

    // Bob's later sends skip alice.
    bob.peer.send_text("1");
    assert_eq!(bob.next_frame().await["type"], "self");
}

#[tokio::test]
async fn test_abrupt_disconnect_then_room_reaped_after_last_leaves() {
    let registry = RoomRegistry::new(RoomConfig {
        reap_interval: Duration::from_millis(20),
        idle_grace: Duration::from_millis(50),
        ..RoomConfig::default()
    });
    let room_id = registry.create_room("general");
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;

    alice.peer.fault("connection reset");
    let (end, _) = alice.end().await;
    assert_eq!(end, SessionEnd::TransportLost);
    assert_eq!(members(&registry, room_id), 1);

    bob.peer.send_text("2");
    assert_eq!(bob.next_frame().await["type"], "self");

    // Still occupied by bob: never reaped.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(registry.contains(&room_id));

    bob.peer.close(CloseKind::GoingAway);
    assert_eq!(bob.end().await.0, SessionEnd::PeerClosed);

    tokio::time::timeout(WAIT, async {
        while registry.contains(&room_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("empty room should be reaped");
}

#[tokio::test]
async fn test_peer_vanishing_without_close_is_transport_lost() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let Client { peer, task, .. } = connect(&registry, room_id, "alice").await;

    drop(peer);
    let end = tokio::time::timeout(WAIT, task)
        .await
        .expect("session should finish")
        .unwrap();

    assert_eq!(end, SessionEnd::TransportLost);
    assert_eq!(members(&registry, room_id), 0);
}

#[tokio::test]
async fn test_cancellation_tears_down() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let mut states = alice.handle.watch_state();
    assert_eq!(*states.borrow_and_update(), SessionState::Active);

    alice.cancel.cancel();
    let (end, peer) = alice.end().await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert_eq!(*states.borrow_and_update(), SessionState::Closed);
    assert!(peer.is_closed_by_server());
    assert_eq!(members(&registry, room_id), 0);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let handle = alice.handle.clone();

    assert!(handle.teardown().await);
    assert!(!handle.teardown().await);

    let (end, peer) = alice.end().await;
    assert_eq!(end, SessionEnd::Cancelled);
    assert_eq!(peer.close_calls(), 1);
    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(members(&registry, room_id), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_teardown_runs_once() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let handle = alice.handle.clone();
            tokio::spawn(async move {
                let performed = handle.teardown().await;
                (performed, handle.state())
            })
        })
        .collect();
    alice.cancel.cancel();

    let mut performed = 0;
    for attempt in attempts {
        let (did_work, state) = attempt.await.unwrap();
        assert_eq!(state, SessionState::Closed, "teardown returned before completion");
        if did_work {
            performed += 1;
        }
    }
    let (_, peer) = alice.end().await;

    assert!(performed <= 1, "teardown ran {performed} times from handles");
    assert_eq!(peer.close_calls(), 1);
    assert_eq!(members(&registry, room_id), 0);
}

// =========================================================================
// Write failures
// =========================================================================

#[tokio::test]
async fn test_write_to_normally_closed_peer_stops_quietly() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;

    alice.peer.fail_writes(CloseKind::GoingAway);
    bob.peer.send_text("3");

    assert_eq!(alice.end().await.0, SessionEnd::PeerClosed);
    assert_eq!(members(&registry, room_id), 1);
}

#[tokio::test]
async fn test_abnormal_write_failure_ends_session() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let alice = connect(&registry, room_id, "alice").await;
    let bob = connect(&registry, room_id, "bob").await;

    alice.peer.fail_writes(CloseKind::Abnormal);
    bob.peer.send_text("4");

    assert_eq!(alice.end().await.0, SessionEnd::WriteFailed);
    assert_eq!(members(&registry, room_id), 1);
}

// =========================================================================
// Overflow
// =========================================================================

#[tokio::test]
async fn test_overflow_evicts_slow_subscriber() {
    let (registry, room_id) = registry_with(InboxConfig {
        capacity: 1,
        overflow: OverflowPolicy::Disconnect,
    });

    // Alice joins but her session is not running, so nothing drains her
    // inbox.
    let pending = PendingSession::new(Arc::clone(&registry), room_id, "alice").unwrap();
    let (channel, _alice_peer) = memory::pair();
    let alice = pending.activate(channel).await.unwrap();
    let bob = connect(&registry, room_id, "bob").await;

    bob.peer.send_text("1");
    assert_eq!(bob.next_frame().await["type"], "self");
    bob.peer.send_text("2");
    assert_eq!(bob.next_frame().await["type"], "self");

    let end = tokio::time::timeout(WAIT, alice.run(CancellationToken::new()))
        .await
        .expect("evicted session should finish");
    assert_eq!(end, SessionEnd::Disconnected);
    assert_eq!(members(&registry, room_id), 1);
}

// =========================================================================
// Connecting
// =========================================================================

#[tokio::test]
async fn test_pending_rejects_empty_display_name() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let result = PendingSession::new(Arc::clone(&registry), room_id, "");
    assert!(matches!(result, Err(SessionError::InvalidDisplayName(_))));
    assert_eq!(members(&registry, room_id), 0);
}

#[tokio::test]
async fn test_pending_accepts_long_display_name() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let name = "a".repeat(101);
    let pending = PendingSession::new(Arc::clone(&registry), room_id, &name).unwrap();
    assert_eq!(pending.state(), SessionState::Connecting);

    let (channel, _peer) = memory::pair();
    pending.activate(channel).await.unwrap();
    assert_eq!(members(&registry, room_id), 1);
}

#[tokio::test]
async fn test_pending_rejects_unknown_room() {
    let (registry, _) = registry_with(InboxConfig::default());
    let result = PendingSession::new(registry, RoomId::generate(), "alice");
    assert!(matches!(result, Err(SessionError::Room(RoomError::NotFound(_)))));
}

#[tokio::test]
async fn test_abort_never_joins_room() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let pending = PendingSession::new(Arc::clone(&registry), room_id, "alice").unwrap();
    assert_eq!(pending.state(), SessionState::Connecting);

    assert_eq!(pending.abort("upgrade failed"), SessionState::Closed);
    assert_eq!(members(&registry, room_id), 0);
}

#[tokio::test]
async fn test_activate_after_room_deleted_closes_connection() {
    let (registry, room_id) = registry_with(InboxConfig::default());
    let pending = PendingSession::new(Arc::clone(&registry), room_id, "alice").unwrap();
    registry.delete_room(&room_id);

    let (channel, peer) = memory::pair();
    let result = pending.activate(channel).await;
    assert!(matches!(result, Err(SessionError::Room(RoomError::NotFound(_)))));
    assert_eq!(peer.close_calls(), 1);
}
