//! Payload encryption strategy.
//!
//! Gateways may encrypt client payloads end-to-end. A node configured with an
//! [`Encryptor`] decrypts gateway-originated payloads before decoding them.
//! No cipher ships with this crate; deployments plug in their own.

use std::fmt;

/// Errors produced by an [`Encryptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

/// Inbound payload decryption.
pub trait Encryptor: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decrypt an inbound payload.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decrypt` if the payload is corrupt or was sealed
    /// with another key.
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
