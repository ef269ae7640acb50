//! Master key handling: parsing, validation, generation, environment lookup.

use std::fmt;

use crate::error::{CipherError, CipherResult, DecryptFailure};

/// Environment variable holding the process-wide master key.
pub const MASTER_KEY_ENV: &str = "TENANTGRID_MASTER_KEY";

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Key length in hex characters.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

/// A parsed 256-bit symmetric key.
///
/// `Debug` is redacted and the key never appears in error messages, so a
/// `MasterKey` can sit inside config structs that get logged.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Parse a key from 64 hex characters (either case).
    pub fn from_hex(key_hex: &str) -> CipherResult<Self> {
        parse_key(key_hex)
            .map(Self)
            .map_err(|e| CipherError::InvalidKey(e.to_string()))
    }

    /// Read the master key from [`MASTER_KEY_ENV`].
    ///
    /// This is the only place the master key enters the process.
    pub fn from_env() -> CipherResult<Self> {
        let value = match std::env::var(MASTER_KEY_ENV) {
            Ok(v) => Some(v),
            Err(std::env::VarError::NotPresent) => None,
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(CipherError::InvalidKey(format!(
                    "{MASTER_KEY_ENV} is not valid unicode"
                )));
            }
        };
        Self::from_env_value(value.as_deref())
    }

    /// Interpret a raw environment value as the master key. Empty counts as unset.
    pub fn from_env_value(value: Option<&str>) -> CipherResult<Self> {
        match value.map(str::trim) {
            None | Some("") => Err(CipherError::MissingMasterKey(MASTER_KEY_ENV)),
            Some(v) => Self::from_hex(v),
        }
    }

    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> CipherResult<Self> {
        let mut bytes = [0u8; KEY_LEN];
        getrandom::getrandom(&mut bytes).map_err(|e| CipherError::Random(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Lowercase hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// True iff `candidate` is exactly 64 hexadecimal characters.
pub fn is_valid_key(candidate: &str) -> bool {
    candidate.len() == KEY_HEX_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Generate a random 256-bit key as lowercase hex.
pub fn generate_key() -> CipherResult<String> {
    Ok(MasterKey::generate()?.to_hex())
}

pub(crate) fn parse_key(key_hex: &str) -> Result<[u8; KEY_LEN], DecryptFailure> {
    if key_hex.len() != KEY_HEX_LEN {
        return Err(DecryptFailure::KeyLength(key_hex.len()));
    }
    let mut bytes = [0u8; KEY_LEN];
    hex::decode_to_slice(key_hex, &mut bytes).map_err(|_| DecryptFailure::KeyEncoding)?;
    Ok(bytes)
}
