//! The inbound/outbound message envelope.
//!
//! Every unit of work moving through a node carries a `Message`: a sequence
//! number chosen by the client, a route number selecting the handler, and a
//! payload. The payload is either raw bytes straight off the wire or a typed
//! value produced in-process, which lets locally originated messages skip the
//! codec entirely.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::CodecError;

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Body of a [`Message`].
///
/// Serialized untagged so that a `Bytes` payload is a plain `MsgPack` bin and
/// a `Value` payload is the value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Encoded (and possibly encrypted) bytes as received from the transport.
    Bytes(Bytes),
    /// Structured value that never went through the wire format.
    Value(rmpv::Value),
}

impl Payload {
    /// Builds a typed payload from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if `value` cannot be represented as a
    /// `MsgPack` value (e.g. a map with non-string keys that fails to serialize).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        rmpv::ext::to_value(value)
            .map(Payload::Value)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Returns `true` for a zero-length byte payload. Typed values are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Bytes(b) if b.is_empty())
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Bytes(Bytes::new())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<rmpv::Value> for Payload {
    fn from(value: rmpv::Value) -> Self {
        Payload::Value(value)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Request/response envelope exchanged between gateways, nodes and actors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Client-chosen sequence number, echoed back on responses.
    pub seq: i32,
    /// Route number selecting the handler.
    pub route: i32,
    /// Message body.
    pub data: Payload,
}

impl Message {
    #[must_use]
    pub fn new(seq: i32, route: i32, data: impl Into<Payload>) -> Self {
        Self {
            seq,
            route,
            data: data.into(),
        }
    }
}
