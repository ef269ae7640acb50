//! Error types for the tenantgrid cipher.

use thiserror::Error;

/// Result type alias for cipher operations.
pub type CipherResult<T> = Result<T, CipherError>;

/// Errors raised by key handling, encryption, and decryption.
///
/// Messages never contain key material or plaintext.
#[derive(Clone, Debug, Error)]
pub enum CipherError {
    /// The master key is absent from the environment.
    #[error("master key is not set (expected in {0})")]
    MissingMasterKey(&'static str),

    /// A key could not be decoded as 32 bytes of hex.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// The OS random source failed.
    #[error("random source unavailable: {0}")]
    Random(String),

    /// Decryption could not complete.
    #[error("decryption failed: {0}")]
    Decryption(#[from] DecryptFailure),
}

impl CipherError {
    /// True for errors caused by operator misconfiguration rather than bad data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CipherError::MissingMasterKey(_) | CipherError::InvalidKey(_) | CipherError::Random(_)
        )
    }
}

/// Underlying cause of a decryption failure.
#[derive(Clone, Debug, Error)]
pub enum DecryptFailure {
    #[error("key must be 64 hex characters, got {0} characters")]
    KeyLength(usize),

    #[error("key is not valid hex")]
    KeyEncoding,

    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext has invalid length {0}")]
    Length(usize),

    #[error("unsupported ciphertext version {0:#04x}")]
    Version(u8),

    #[error("padding check failed")]
    Padding,

    #[error("plaintext is not valid UTF-8")]
    Utf8,
}
