//! AES-256-CBC sealing and opening of secret strings.
//!
//! Two stored formats exist:
//!
//! ```text
//! legacy     base64( CBC(key, iv = 0^16, pkcs7(plaintext)) )
//! versioned  base64( 0x01 || iv[16] || CBC(key, iv, pkcs7(plaintext)) )
//! ```
//!
//! The legacy format uses a constant all-zero IV, so equal plaintexts encrypt
//! to equal ciphertexts. It is only written when configured explicitly, for
//! deployments whose stored values must stay bit-for-bit compatible. Both
//! formats are always readable: a decoded length that is a multiple of the
//! block size is legacy, one byte over with a leading `0x01` is versioned.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tracing::warn;

use crate::error::{CipherError, CipherResult, DecryptFailure};
use crate::key::{KEY_LEN, MasterKey, parse_key};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK_LEN: usize = 16;
const LEGACY_IV: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];
const VERSION_RANDOM_IV: u8 = 0x01;

/// Which ciphertext layout new values are written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CipherFormat {
    /// Fixed all-zero IV. Leaks equality of identical plaintexts.
    Legacy,
    /// Random IV prefixed with a version byte (default).
    #[default]
    Versioned,
}

impl CipherFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherFormat::Legacy => "legacy",
            CipherFormat::Versioned => "versioned",
        }
    }
}

impl fmt::Display for CipherFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(CipherFormat::Legacy),
            "versioned" => Ok(CipherFormat::Versioned),
            _ => Err(format!("unknown cipher format: {s}")),
        }
    }
}

/// A master key bound to an output format.
///
/// Constructed once from configuration and passed to whatever needs to read
/// or write encrypted settings.
#[derive(Clone, Debug)]
pub struct Cipher {
    key: MasterKey,
    format: CipherFormat,
}

impl Cipher {
    pub fn new(key: MasterKey, format: CipherFormat) -> Self {
        Self { key, format }
    }

    /// The format used for newly encrypted values.
    pub fn format(&self) -> CipherFormat {
        self.format
    }

    /// Encrypt `plaintext`. Empty input yields an empty string.
    pub fn encrypt(&self, plaintext: &str) -> CipherResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        seal(self.key.as_bytes(), plaintext, self.format)
    }

    /// Decrypt a value written in either format. Empty input yields an empty string.
    pub fn decrypt(&self, ciphertext: &str) -> CipherResult<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        Ok(open(self.key.as_bytes(), ciphertext)?)
    }

    /// Encrypt every value, failing on the first error.
    pub fn encrypt_map(
        &self,
        values: &BTreeMap<String, String>,
    ) -> CipherResult<BTreeMap<String, String>> {
        values
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.encrypt(v)?)))
            .collect()
    }

    /// Decrypt every value. Entries that fail become empty strings.
    pub fn decrypt_map(&self, values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        values
            .iter()
            .map(|(k, v)| {
                let plain = self.decrypt(v).unwrap_or_else(|e| {
                    warn!(key = %k, error = %e, "failed to decrypt value, substituting empty string");
                    String::new()
                });
                (k.clone(), plain)
            })
            .collect()
    }
}

/// Encrypt `plaintext` with a hex key, writing the versioned format.
pub fn encrypt(plaintext: &str, key_hex: &str) -> CipherResult<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let key = MasterKey::from_hex(key_hex)?;
    seal(key.as_bytes(), plaintext, CipherFormat::Versioned)
}

/// Decrypt a base64 value with a hex key. A bad key is a decryption failure here.
pub fn decrypt(ciphertext: &str, key_hex: &str) -> CipherResult<String> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }
    let key = parse_key(key_hex)?;
    Ok(open(&key, ciphertext)?)
}

/// Encrypt every value of `values` with a hex key.
pub fn encrypt_map(
    values: &BTreeMap<String, String>,
    key_hex: &str,
) -> CipherResult<BTreeMap<String, String>> {
    let key = MasterKey::from_hex(key_hex)?;
    Cipher::new(key, CipherFormat::Versioned).encrypt_map(values)
}

/// Decrypt every value of `values` with a hex key, substituting `""` for failures.
pub fn decrypt_map(values: &BTreeMap<String, String>, key_hex: &str) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| {
            let plain = decrypt(v, key_hex).unwrap_or_else(|e| {
                warn!(key = %k, error = %e, "failed to decrypt value, substituting empty string");
                String::new()
            });
            (k.clone(), plain)
        })
        .collect()
}

fn seal(key: &[u8; KEY_LEN], plaintext: &str, format: CipherFormat) -> CipherResult<String> {
    let iv = match format {
        CipherFormat::Legacy => LEGACY_IV,
        CipherFormat::Versioned => {
            let mut iv = [0u8; BLOCK_LEN];
            getrandom::getrandom(&mut iv).map_err(|e| CipherError::Random(e.to_string()))?;
            iv
        }
    };

    let body = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|_| CipherError::InvalidKey("key length mismatch".to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let sealed = match format {
        CipherFormat::Legacy => body,
        CipherFormat::Versioned => {
            let mut out = Vec::with_capacity(1 + BLOCK_LEN + body.len());
            out.push(VERSION_RANDOM_IV);
            out.extend_from_slice(&iv);
            out.extend_from_slice(&body);
            out
        }
    };
    Ok(STANDARD.encode(sealed))
}

fn open(key: &[u8; KEY_LEN], ciphertext: &str) -> Result<String, DecryptFailure> {
    let raw = STANDARD.decode(ciphertext.trim())?;

    let (iv, body) = match raw.len() % BLOCK_LEN {
        0 if !raw.is_empty() => (LEGACY_IV, raw.as_slice()),
        1 if raw.len() >= 1 + 2 * BLOCK_LEN => {
            if raw[0] != VERSION_RANDOM_IV {
                return Err(DecryptFailure::Version(raw[0]));
            }
            let mut iv = [0u8; BLOCK_LEN];
            iv.copy_from_slice(&raw[1..=BLOCK_LEN]);
            (iv, &raw[1 + BLOCK_LEN..])
        }
        _ => return Err(DecryptFailure::Length(raw.len())),
    };

    let plain = Aes256CbcDec::new_from_slices(key, &iv)
        .map_err(|_| DecryptFailure::KeyLength(key.len() * 2))?
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| DecryptFailure::Padding)?;

    String::from_utf8(plain).map_err(|_| DecryptFailure::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    const OTHER_KEY: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    fn cipher(format: CipherFormat) -> Cipher {
        Cipher::new(MasterKey::from_hex(KEY).unwrap(), format)
    }

    #[test]
    fn round_trip_versioned() {
        for plaintext in [
            "p",
            "correct horse battery staple",
            "exactly sixteen!",
            "db.tenant-7.internal",
            "pässwörd ✓ 日本",
            &"x".repeat(1000),
        ] {
            let ct = encrypt(plaintext, KEY).unwrap();
            assert_eq!(decrypt(&ct, KEY).unwrap(), plaintext);
        }
    }

    #[test]
    fn round_trip_legacy() {
        let c = cipher(CipherFormat::Legacy);
        for plaintext in ["sa", "1433", "hunter2 with spaces"] {
            let ct = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&ct).unwrap(), plaintext);
        }
    }

    #[test]
    fn empty_inputs_short_circuit() {
        assert_eq!(encrypt("", KEY).unwrap(), "");
        assert_eq!(decrypt("", KEY).unwrap(), "");
        assert_eq!(cipher(CipherFormat::Versioned).encrypt("").unwrap(), "");
        assert_eq!(cipher(CipherFormat::Legacy).decrypt("").unwrap(), "");
    }

    #[test]
    fn legacy_is_deterministic_versioned_is_not() {
        let legacy = cipher(CipherFormat::Legacy);
        assert_eq!(legacy.encrypt("secret").unwrap(), legacy.encrypt("secret").unwrap());

        let versioned = cipher(CipherFormat::Versioned);
        assert_ne!(versioned.encrypt("secret").unwrap(), versioned.encrypt("secret").unwrap());
    }

    #[test]
    fn legacy_ciphertext_is_whole_blocks() {
        let ct = cipher(CipherFormat::Legacy).encrypt("secret").unwrap();
        let raw = STANDARD.decode(ct).unwrap();
        assert_eq!(raw.len(), BLOCK_LEN);
    }

    #[test]
    fn versioned_ciphertext_layout() {
        let ct = cipher(CipherFormat::Versioned).encrypt("secret").unwrap();
        let raw = STANDARD.decode(ct).unwrap();
        assert_eq!(raw[0], VERSION_RANDOM_IV);
        assert_eq!(raw.len(), 1 + BLOCK_LEN + BLOCK_LEN);
    }

    #[test]
    fn both_formats_readable_by_either_cipher() {
        let legacy = cipher(CipherFormat::Legacy);
        let versioned = cipher(CipherFormat::Versioned);
        let a = legacy.encrypt("shared").unwrap();
        let b = versioned.encrypt("shared").unwrap();
        assert_eq!(versioned.decrypt(&a).unwrap(), "shared");
        assert_eq!(legacy.decrypt(&b).unwrap(), "shared");
    }

    #[test]
    fn encrypt_with_bad_key_is_configuration_error() {
        let err = encrypt("secret", "not-a-key").unwrap_err();
        assert!(err.is_configuration());
        let err = encrypt("secret", &"zz".repeat(32)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn decrypt_with_bad_key_is_decryption_error() {
        let ct = encrypt("secret", KEY).unwrap();
        let err = decrypt(&ct, "abcd").unwrap_err();
        assert!(matches!(err, CipherError::Decryption(DecryptFailure::KeyLength(4))));
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let ct = cipher(CipherFormat::Legacy).encrypt("secret value").unwrap();
        // A wrong key almost always breaks padding; if padding happens to
        // verify, the output must still differ from the plaintext.
        match decrypt(&ct, OTHER_KEY) {
            Err(CipherError::Decryption(_)) => {}
            Ok(plain) => assert_ne!(plain, "secret value"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decrypt_garbage_fails() {
        assert!(matches!(
            decrypt("%%% not base64 %%%", KEY),
            Err(CipherError::Decryption(DecryptFailure::Base64(_)))
        ));
        // 5 bytes: neither whole blocks nor versioned.
        assert!(matches!(
            decrypt(&STANDARD.encode([1u8, 2, 3, 4, 5]), KEY),
            Err(CipherError::Decryption(DecryptFailure::Length(5)))
        ));
    }

    #[test]
    fn decrypt_unknown_version_fails() {
        let mut raw = vec![0x02u8];
        raw.extend_from_slice(&[0u8; 32]);
        let err = decrypt(&STANDARD.encode(raw), KEY).unwrap_err();
        assert!(matches!(err, CipherError::Decryption(DecryptFailure::Version(0x02))));
    }

    #[test]
    fn decrypt_map_isolates_failures() {
        let mut values = BTreeMap::new();
        values.insert("good".to_string(), encrypt("plain", KEY).unwrap());
        values.insert("bad".to_string(), "garbage!".to_string());

        let out = decrypt_map(&values, KEY);
        assert_eq!(out.get("good").map(String::as_str), Some("plain"));
        assert_eq!(out.get("bad").map(String::as_str), Some(""));
    }

    #[test]
    fn cipher_decrypt_map_isolates_failures() {
        let c = cipher(CipherFormat::Versioned);
        let mut values = BTreeMap::new();
        values.insert("host".to_string(), c.encrypt("db.internal").unwrap());
        values.insert("port".to_string(), "AAAA".to_string());

        let out = c.decrypt_map(&values);
        assert_eq!(out["host"], "db.internal");
        assert_eq!(out["port"], "");
    }

    #[test]
    fn encrypt_map_then_decrypt_map() {
        let mut values = BTreeMap::new();
        values.insert("user".to_string(), "app".to_string());
        values.insert("empty".to_string(), String::new());

        let sealed = encrypt_map(&values, KEY).unwrap();
        assert_ne!(sealed["user"], "app");
        assert_eq!(sealed["empty"], "");
        assert_eq!(decrypt_map(&sealed, KEY), values);
    }

    #[test]
    fn encrypt_map_rejects_bad_key() {
        let values = BTreeMap::from([("a".to_string(), "b".to_string())]);
        assert!(encrypt_map(&values, "short").is_err());
    }

    #[test]
    fn format_parsing() {
        assert_eq!("legacy".parse::<CipherFormat>(), Ok(CipherFormat::Legacy));
        assert_eq!("Versioned".parse::<CipherFormat>(), Ok(CipherFormat::Versioned));
        assert!("gcm".parse::<CipherFormat>().is_err());
        assert_eq!(CipherFormat::default(), CipherFormat::Versioned);
    }
}
