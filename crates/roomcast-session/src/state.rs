//! Session lifecycle state machine.

use std::fmt;

/// The lifecycle state of a connection session.
///
/// Transitions are strictly ordered, with one shortcut for a failed
/// handshake:
///
/// ```text
/// Connecting → Active → Closing → Closed
///      └───────(handshake failed)────┘
/// ```
///
/// - **Connecting**: the request was accepted; the subscriber exists but
///   is not in the room yet.
/// - **Active**: the subscriber is a member and both loops are running.
/// - **Closing**: teardown has started. Nothing leaves this state except
///   by finishing teardown.
/// - **Closed**: the subscriber is out of the room and the connection is
///   closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Returns the next state in the normal lifecycle, or `None` from
    /// `Closed`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Active),
            Self::Active => Some(Self::Closing),
            Self::Closing => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
            || (self == Self::Connecting && target == Self::Closed)
    }

    /// Returns `true` once the session can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
