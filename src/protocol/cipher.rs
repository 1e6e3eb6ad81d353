//! HDM body encryption
//!
//! Bodies are Triple-DES (EDE3) in ECB mode with PKCS#7 padding. Before login
//! the key is derived from the device password; after login the terminal hands
//! out a per-session key.

use base64::Engine;
use des::TdesEde3;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::generic_array::GenericArray;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

type TdesEcbEnc = ecb::Encryptor<TdesEde3>;
type TdesEcbDec = ecb::Decryptor<TdesEde3>;

/// Triple-DES key size in bytes
pub const KEY_LEN: usize = 24;

/// DES block size in bytes
pub const BLOCK_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Session key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Session key is not valid base64")]
    InvalidKeyEncoding,
    #[error("Failed to decrypt response body")]
    Decrypt,
}

/// A 24-byte Triple-DES key
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Key A: the first 24 bytes of SHA-256 over the device password
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest[..KEY_LEN]);
        Self(key)
    }

    /// Key B: the base64 `key` field returned by a successful login
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidKeyEncoding)?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_LEN] = raw
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(raw.len()))?;
        Ok(Self(key))
    }

    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        TdesEcbEnc::new(GenericArray::from_slice(&self.0)).encrypt_padded_vec_mut::<Pkcs7>(plain)
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, CipherError> {
        // padded bodies are never empty and always whole blocks
        if cipher.is_empty() || cipher.len() % BLOCK_LEN != 0 {
            return Err(CipherError::Decrypt);
        }

        TdesEcbDec::new(GenericArray::from_slice(&self.0))
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| CipherError::Decrypt)
    }

    /// Short non-reversible fingerprint for logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}
