//! `pairlink` crypto primitives
//!
//! Key material and message protection for a two-party session whose key is
//! handed over out of band.
//!
//! ## Crypto primitives
//!
//! - **Key**: one random 256-bit key per session, generated by the host
//! - **Encryption**: ChaCha20-Poly1305 AEAD, fresh random 12-byte nonce per message

pub mod cipher;
pub mod error;
pub mod key;

pub use cipher::{EncryptedData, NONCE_SIZE, TAG_SIZE, decrypt, decrypt_frame, encrypt};
pub use error::CryptoError;
#[cfg(any(test, feature = "test-utils"))]
pub use key::fixed_key;
pub use key::{KEY_SIZE, SessionKey};
