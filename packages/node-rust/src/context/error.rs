use hearth_core::{CodecError, CryptoError};

/// Errors returned by request context operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The payload could not be decrypted or decoded into the target type.
    #[error("decode failed: {0}")]
    Decode(String),
    /// A response payload could not be converted into a message body.
    #[error("encode failed: {0}")]
    Encode(String),
    /// The operation needs identity this context does not have.
    #[error("illegal operation: {0}")]
    IllegalOperation(&'static str),
    /// The handle outlived its claim: the context was recycled or claimed by
    /// newer work, so it no longer describes this request.
    #[error("stale request: context was reassigned")]
    Stale,
    /// Scheduler or proxy failure, passed through unchanged.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl From<CodecError> for ContextError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Encode(msg) => ContextError::Encode(msg),
            CodecError::Decode(msg) => ContextError::Decode(msg),
        }
    }
}

impl From<CryptoError> for ContextError {
    fn from(err: CryptoError) -> Self {
        ContextError::Decode(err.to_string())
    }
}
