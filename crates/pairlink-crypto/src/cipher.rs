//! Message encryption for an open session.
//!
//! ChaCha20-Poly1305 AEAD with a fresh random 12-byte nonce per message.
//! There is no per-session counter: every call is independent, so senders
//! and receivers can interleave freely without sharing state.

use chacha20poly1305::Nonce;
use chacha20poly1305::aead::Aead;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::key::SessionKey;

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Encrypted payload with metadata needed for decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// ChaCha20-Poly1305 ciphertext (includes 16-byte auth tag).
    pub ciphertext: Vec<u8>,
    /// 12-byte nonce used for this encryption.
    pub nonce: [u8; NONCE_SIZE],
}

impl EncryptedData {
    /// Serialize as a channel frame: `nonce || ciphertext`.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        frame.extend_from_slice(&self.nonce);
        frame.extend_from_slice(&self.ciphertext);
        frame
    }

    /// Split a channel frame back into nonce and ciphertext.
    ///
    /// A frame too short to hold a nonce and a tag cannot authenticate, so it
    /// is reported the same way as a failed tag check.
    pub fn from_frame(frame: &[u8]) -> Result<Self, CryptoError> {
        if frame.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Authentication);
        }
        let (nonce_bytes, ciphertext) = frame.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            nonce,
        })
    }
}

/// Encrypt a text message under the session key.
pub fn encrypt(key: &SessionKey, plaintext: &str) -> Result<EncryptedData, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce_bytes,
    })
}

/// Decrypt a message and decode it as UTF-8 text.
pub fn decrypt(
    key: &SessionKey,
    nonce_bytes: &[u8],
    ciphertext: &[u8],
) -> Result<String, CryptoError> {
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::Authentication);
    }
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::Authentication)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Authentication)
}

/// Decrypt a `nonce || ciphertext` frame as received from the channel.
pub fn decrypt_frame(key: &SessionKey, frame: &[u8]) -> Result<String, CryptoError> {
    let data = EncryptedData::from_frame(frame)?;
    decrypt(key, &data.nonce, &data.ciphertext)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use chacha20poly1305::aead::Aead;

    use super::*;
    use crate::key::fixed_key;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = SessionKey::generate();
        let encrypted = encrypt(&key, "Hello, encrypted world!").unwrap();
        let decrypted = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, "Hello, encrypted world!");
    }

    #[test]
    fn encrypt_empty_text() {
        let key = SessionKey::generate();
        let encrypted = encrypt(&key, "").unwrap();
        assert_eq!(encrypted.ciphertext.len(), TAG_SIZE);
        let decrypted = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn encrypt_non_ascii_text() {
        let key = SessionKey::generate();
        let text = "héllo wörld - привет 👋 你好";
        let encrypted = encrypt(&key, text).unwrap();
        let decrypted = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, text);
    }

    #[test]
    fn ciphertext_is_plaintext_plus_tag() {
        let key = SessionKey::generate();
        let encrypted = encrypt(&key, "payload data").unwrap();
        assert_eq!(encrypted.ciphertext.len(), "payload data".len() + TAG_SIZE);
    }

    #[test]
    fn same_plaintext_yields_fresh_nonce_and_ciphertext() {
        let key = fixed_key(1);
        let first = encrypt(&key, "same").unwrap();
        let second = encrypt(&key, "same").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn nonces_never_repeat() {
        let key = SessionKey::generate();
        let mut nonces = std::collections::HashSet::new();
        for _ in 0..1000 {
            let encrypted = encrypt(&key, "x").unwrap();
            assert!(nonces.insert(encrypted.nonce), "nonce collision detected");
        }
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let encrypted = encrypt(&fixed_key(1), "secret data").unwrap();
        let result = decrypt(&fixed_key(2), &encrypted.nonce, &encrypted.ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn decrypt_with_tampered_ciphertext_fails() {
        let key = SessionKey::generate();
        let mut encrypted = encrypt(&key, "secret data").unwrap();
        if let Some(byte) = encrypted.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        let result = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn decrypt_with_tampered_tag_fails() {
        let key = SessionKey::generate();
        let mut encrypted = encrypt(&key, "secret data").unwrap();
        if let Some(byte) = encrypted.ciphertext.last_mut() {
            *byte ^= 0x01;
        }
        let result = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn decrypt_with_flipped_nonce_fails() {
        let key = SessionKey::generate();
        let mut encrypted = encrypt(&key, "secret data").unwrap();
        encrypted.nonce[0] ^= 0x01;
        let result = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn decrypt_with_invalid_nonce_length_fails_authentication() {
        let key = SessionKey::generate();
        let result = decrypt(&key, &[0u8; 8], b"ciphertext");
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn decrypt_empty_ciphertext_fails() {
        let key = SessionKey::generate();
        let result = decrypt(&key, &[0u8; NONCE_SIZE], &[]);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn authenticated_non_utf8_plaintext_is_rejected() {
        let key = fixed_key(9);
        let nonce = [3u8; NONCE_SIZE];
        let ciphertext = key
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), &[0xFFu8, 0xFE, 0xFD][..])
            .unwrap();
        let result = decrypt(&key, &nonce, &ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn frame_roundtrip_decrypts() {
        let key = SessionKey::generate();
        let frame = encrypt(&key, "framed").unwrap().to_frame();
        assert_eq!(frame.len(), NONCE_SIZE + "framed".len() + TAG_SIZE);
        assert_eq!(decrypt_frame(&key, &frame).unwrap(), "framed");
    }

    #[test]
    fn short_frame_is_rejected() {
        let key = SessionKey::generate();
        let result = decrypt_frame(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn imported_key_decrypts_what_exporter_encrypted() {
        let host_key = SessionKey::generate();
        let guest_key = SessionKey::import(&host_key.export()).unwrap();
        let encrypted = encrypt(&host_key, "hello").unwrap();
        let decrypted = decrypt(&guest_key, &encrypted.nonce, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, "hello");
    }
}
