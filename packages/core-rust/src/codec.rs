//! Pluggable payload codecs.
//!
//! Codecs are trait objects so a node can be configured with any of them at
//! runtime. To keep `Codec` object-safe the trait speaks in terms of
//! [`rmpv::Value`]; callers convert into their own types with
//! [`decode_into`] or [`rmpv::ext::from_value`].

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors produced while encoding or decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Decodes wire bytes into structured values.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Short name used in logs (e.g. `"msgpack"`).
    fn name(&self) -> &'static str;

    /// Decode bytes into a structured value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` on malformed input.
    fn unmarshal(&self, data: &[u8]) -> Result<rmpv::Value, CodecError>;
}

/// Decodes `data` with `codec` and overwrites `target` with the result.
///
/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are malformed or do not match the
/// shape of `T`. `target` is left untouched on error.
pub fn decode_into<T: DeserializeOwned>(
    codec: &dyn Codec,
    data: &[u8],
    target: &mut T,
) -> Result<(), CodecError> {
    let value = codec.unmarshal(data)?;
    *target = rmpv::ext::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// MsgPackCodec
// ---------------------------------------------------------------------------

/// `MsgPack` codec backed by `rmp-serde`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<rmpv::Value, CodecError> {
        rmp_serde::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<rmpv::Value, CodecError> {
        serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CodecKind
// ---------------------------------------------------------------------------

/// Built-in codec selector, usable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    MsgPack,
    Json,
}

impl CodecKind {
    /// Instantiates the selected codec.
    #[must_use]
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::MsgPack => Arc::new(MsgPackCodec),
            CodecKind::Json => Arc::new(JsonCodec),
        }
    }
}
