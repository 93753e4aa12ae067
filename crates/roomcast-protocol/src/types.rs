//! Core protocol types for roomcast's wire format.
//!
//! Everything here is either a key in one of the relay's maps or a value
//! that ends up serialized into a frame on a subscriber's connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a chat room.
///
/// Wraps a random UUID v4. Clients only ever see it as an opaque string:
/// it serializes and displays as the hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Generates a fresh, random room ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId(s.to_string()))
    }
}

/// A unique identifier for one connected subscriber.
///
/// Generated when the connection starts; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Generates a fresh, random subscriber ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriberId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId(s.to_string()))
    }
}

/// A subscriber's caller-supplied display name.
///
/// Any non-empty string. Whitespace is kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validates and wraps a display name.
    ///
    /// # Errors
    /// Returns [`ProtocolError::DisplayNameEmpty`] for an empty string.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::DisplayNameEmpty);
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Who sent a message and what it said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// The sending subscriber.
    pub sender_id: SubscriberId,
    /// The sender's display name at the time of sending.
    pub sender_display_name: DisplayName,
    /// The message body, exactly as the sender's frame carried it.
    pub text: String,
}

/// A message in a subscriber's inbox.
///
/// On the wire this is `{"type": "text" | "self", "payload": {...}}`.
/// [`ChatMessage::Terminate`] only ever travels through the inbox: it
/// tells the session's writer that the transport is gone, and encoding
/// it fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ChatMessage {
    /// Broadcast from another member of the room.
    Text(MessagePayload),

    /// Echo of the subscriber's own message.
    #[serde(rename = "self")]
    SelfEcho(MessagePayload),

    /// Internal sentinel: the transport was lost.
    #[serde(skip)]
    Terminate,
}

/// The kind of a [`ChatMessage`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    SelfEcho,
    Terminate,
}

impl ChatMessage {
    /// Returns this message's kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::SelfEcho(_) => MessageKind::SelfEcho,
            Self::Terminate => MessageKind::Terminate,
        }
    }

    /// Returns the payload, or `None` for the terminate sentinel.
    pub fn payload(&self) -> Option<&MessagePayload> {
        match self {
            Self::Text(p) | Self::SelfEcho(p) => Some(p),
            Self::Terminate => None,
        }
    }
}

impl MessageKind {
    /// The `type` tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::SelfEcho => "self",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================================================================
// Tests
// =========================================================================
