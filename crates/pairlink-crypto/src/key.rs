//! Session key management.
//!
//! One 256-bit ChaCha20-Poly1305 key per session. The host generates it,
//! the guest imports it from the invite token. The raw bytes are wiped when
//! the key is dropped.

use chacha20poly1305::aead::KeyInit;
use chacha20poly1305::{ChaCha20Poly1305, Key};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Raw key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Symmetric key shared by both ends of one session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SessionKey {}

impl SessionKey {
    /// Generate a fresh random key from the OS RNG.
    ///
    /// Panics only if the OS RNG is unavailable, which is unrecoverable.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Export the raw key bytes. Handle with care.
    pub fn export(&self) -> [u8; KEY_SIZE] {
        self.bytes
    }

    /// Rebuild a key from raw bytes received out of band.
    pub fn import(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::KeyImport(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        // Reject anything the cipher itself would refuse.
        ChaCha20Poly1305::new_from_slice(bytes)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))?;

        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        let key = Self { bytes: arr };
        arr.zeroize();
        Ok(key)
    }

    pub(crate) fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.bytes))
    }
}

/// Build a key with every byte set to `byte`, for deterministic tests.
#[cfg(any(test, feature = "test-utils"))]
pub fn fixed_key(byte: u8) -> SessionKey {
    SessionKey {
        bytes: [byte; KEY_SIZE],
    }
}
