//! Duplex message types: raw messages, frames and the routing envelope.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One complete duplex message, as text.
///
/// Inbound messages are handed to type handlers uninterpreted; outbound
/// messages are written to the transport whole, one per write section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(String);

impl Message {
    /// Returns the message text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the message, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Serializes `value` as a JSON message.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `value` fails to serialize.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Transport-level unit seen by the session's read loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete message.
    Text(String),
    /// The peer initiated a close.
    Close,
}

/// First-level routing discriminator (the envelope's `type` field).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(String);

impl MessageType {
    /// Discriminator of RPC call envelopes.
    pub const CALL: &'static str = "call";

    /// Creates a discriminator.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The `"call"` discriminator.
    #[must_use]
    pub fn call() -> Self {
        Self::new(Self::CALL)
    }

    /// Returns the discriminator text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MessageType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partial decode of an inbound message: only the discriminator.
///
/// All other fields are type-specific and ignored here.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: MessageType,
}

impl Envelope {
    /// Extracts the envelope from a raw message.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the message is not a JSON object
    /// with a string `type` field.
    pub fn peek(msg: &Message) -> Result<Self, serde_json::Error> {
        serde_json::from_str(msg.as_str())
    }
}
