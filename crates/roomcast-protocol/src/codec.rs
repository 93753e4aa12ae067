//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec converts between Rust values and frame bytes. The session
//! layer only talks to the [`Codec`] trait; [`JsonCodec`] is the one the
//! relay ships with, since clients speak JSON.

use serde::{Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside session tasks
/// that Tokio may move between worker threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented
    /// in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Returns `true` if `data` is a well-formed document in this format,
    /// whatever its shape.
    ///
    /// The relay uses this to decide whether an inbound frame is a
    /// protocol message at all.
    fn is_well_formed(&self, data: &[u8]) -> bool {
        self.decode::<IgnoredAny>(data).is_ok()
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use roomcast_protocol::{
///     ChatMessage, Codec, DisplayName, JsonCodec, MessagePayload, SubscriberId,
/// };
///
/// let codec = JsonCodec;
/// let msg = ChatMessage::Text(MessagePayload {
///     sender_id: SubscriberId::generate(),
///     sender_display_name: DisplayName::new("alice").unwrap(),
///     text: "hello".to_string(),
/// });
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: ChatMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
