//! Crypto error types.

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key import failed: {0}")]
    KeyImport(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Tag mismatch, wrong key, malformed frame or nonce, or non-UTF-8 plaintext.
    #[error("Message failed authentication")]
    Authentication,
}
