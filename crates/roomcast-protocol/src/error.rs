//! Error types for the protocol layer.
//!
//! Each roomcast crate defines its own error enum, so a `ProtocolError`
//! always means a problem with identifiers or (de)serialization, never
//! with networking or room membership.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into a frame).
    ///
    /// Also returned for messages that must never reach the wire, such
    /// as the internal terminate sentinel.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: the frame is not valid JSON or does not
    /// match the expected shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A display name was empty.
    #[error("display name cannot be empty")]
    DisplayNameEmpty,

    /// A string could not be parsed as an identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
