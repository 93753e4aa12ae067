//! Idle room reaper.
//!
//! One task per room. It holds only a weak reference to the registry, so
//! dropping the registry stops every reaper at its next tick.

use std::sync::Weak;
use std::time::Duration;

use roomcast_protocol::RoomId;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::RoomRegistry;
use crate::registry::ReapOutcome;

/// Spawns the reaper for `room_id`.
///
/// The first check happens one `interval` after the call. Checks that
/// fall behind are skipped rather than bunched up. `interval` must
/// already be clamped with [`RoomConfig::effective_reap_interval`].
///
/// [`RoomConfig::effective_reap_interval`]: crate::RoomConfig::effective_reap_interval
pub(crate) fn spawn_reaper(
    registry: Weak<RoomRegistry>,
    room_id: RoomId,
    interval: Duration,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run(registry, room_id, interval, grace))
}

async fn run(
    registry: Weak<RoomRegistry>,
    room_id: RoomId,
    interval: Duration,
    grace: Duration,
) {
    let start = Instant::now()
        .checked_add(interval)
        .unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(registry) = registry.upgrade() else {
            tracing::debug!(%room_id, "registry dropped, reaper stopping");
            return;
        };
        match registry.reap_if_idle(&room_id, grace) {
            ReapOutcome::Busy => {}
            ReapOutcome::Reaped => return,
            ReapOutcome::Gone => {
                tracing::debug!(%room_id, "room already deleted, reaper stopping");
                return;
            }
        }
    }
}
