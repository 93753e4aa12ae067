//! Wire protocol for roomcast.
//!
//! This crate defines what travels between a client and the relay:
//!
//! - **Identity types** ([`RoomId`], [`SubscriberId`], [`DisplayName`]):
//!   opaque, validated values used as map keys and in payloads.
//! - **Messages** ([`ChatMessage`], [`MessagePayload`]): what a
//!   subscriber's inbox carries and what its connection receives.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become
//!   frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ChatMessage) → Room (fan-out)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChatMessage, DisplayName, MessageKind, MessagePayload, RoomId,
    SubscriberId,
};
