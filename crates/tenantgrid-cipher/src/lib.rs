//! tenantgrid-cipher: at-rest protection for tenant secrets.
//!
//! AES-256-CBC with PKCS#7 padding, base64 transport encoding, and a
//! process-wide master key supplied through the environment.
//!
//! ```rust,ignore
//! use tenantgrid_cipher::{Cipher, CipherFormat, MasterKey};
//!
//! let cipher = Cipher::new(MasterKey::from_env()?, CipherFormat::Versioned);
//! let sealed = cipher.encrypt("s3cret")?;
//! assert_eq!(cipher.decrypt(&sealed)?, "s3cret");
//! ```

pub mod aes_cbc;
pub mod error;
pub mod key;

pub use aes_cbc::{Cipher, CipherFormat, decrypt, decrypt_map, encrypt, encrypt_map};
pub use error::{CipherError, CipherResult, DecryptFailure};
pub use key::{MASTER_KEY_ENV, MasterKey, generate_key, is_valid_key};
