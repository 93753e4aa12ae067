//! Room and inbox configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How often each room's reaper checks whether the room is idle.
    /// Clamped to between one millisecond and
    /// [`RoomConfig::MAX_REAP_INTERVAL`].
    pub reap_interval: Duration,

    /// How long a room must stay empty before the reaper deletes it.
    pub idle_grace: Duration,

    /// Settings for each subscriber's inbox.
    pub inbox: InboxConfig,
}

impl RoomConfig {
    /// Longest interval the reaper will wait between checks.
    pub const MAX_REAP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    /// The reap interval the reaper actually uses.
    pub fn effective_reap_interval(&self) -> Duration {
        self.reap_interval
            .clamp(Duration::from_millis(1), Self::MAX_REAP_INTERVAL)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_secs(30),
            idle_grace: Duration::from_secs(30),
            inbox: InboxConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// InboxConfig
// ---------------------------------------------------------------------------

/// Configuration for a subscriber's inbound message queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InboxConfig {
    /// Maximum number of queued messages. Values below 1 are treated as 1.
    pub capacity: usize,

    /// What fan-out does when the queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            overflow: OverflowPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// OverflowPolicy
// ---------------------------------------------------------------------------

/// What happens when a message is fanned out to a subscriber whose inbox
/// is full.
///
/// Fan-out never waits on a slow subscriber either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the subscriber: its session is torn down. A subscriber that
    /// is still connected has therefore seen every message sent to it.
    #[default]
    Disconnect,

    /// Drop the message for that subscriber only and keep it connected.
    DropNewest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => write!(f, "disconnect"),
            Self::DropNewest => write!(f, "drop-newest"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnect" => Ok(Self::Disconnect),
            "drop-newest" => Ok(Self::DropNewest),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected 'disconnect' or 'drop-newest')"
            )),
        }
    }
}
