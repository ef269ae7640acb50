//! Error taxonomy shared by every tenantgrid crate.

use thiserror::Error;

use tenantgrid_cipher::CipherError;

/// Result type alias for tenant connection operations.
pub type TenantResult<T> = Result<T, TenantError>;

/// Errors surfaced by the tenant connection layer.
#[derive(Clone, Debug, Error)]
pub enum TenantError {
    /// Tenant or setting does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or malformed environment, config file, or setting data.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key mismatch or corrupted ciphertext.
    #[error("decryption error: {0}")]
    Decryption(#[source] CipherError),

    /// Network or driver failure opening or using a pool.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Coarse classification of a [`TenantError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Configuration,
    Decryption,
    Connection,
}

impl TenantError {
    pub fn not_found(what: impl Into<String>) -> Self {
        TenantError::NotFound(what.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        TenantError::Configuration(msg.into())
    }

    pub fn connection(err: impl std::fmt::Display) -> Self {
        TenantError::Connection(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TenantError::NotFound(_) => ErrorKind::NotFound,
            TenantError::Configuration(_) => ErrorKind::Configuration,
            TenantError::Decryption(_) => ErrorKind::Decryption,
            TenantError::Connection(_) => ErrorKind::Connection,
        }
    }

    /// Only connection failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Message safe to show to external callers.
    ///
    /// Configuration and decryption details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "tenant not found",
            ErrorKind::Configuration | ErrorKind::Decryption => "service misconfigured",
            ErrorKind::Connection => "service temporarily unavailable",
        }
    }
}

impl From<CipherError> for TenantError {
    fn from(err: CipherError) -> Self {
        if err.is_configuration() {
            TenantError::Configuration(err.to_string())
        } else {
            TenantError::Decryption(err)
        }
    }
}
