//! Error types for `pairlink` core library.

use std::time::Duration;

use pairlink_crypto::CryptoError;
use thiserror::Error;

use crate::session::SessionState;
use crate::token::TokenError;
use crate::transport::TransportError;

/// Result type alias using `pairlink` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for configuration and link handling.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invite link could not be built from the configured base URL
    #[error("Invalid link base URL: {0}")]
    Link(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the handshake coordinator.
///
/// Recoverable errors leave the session where it was (or back at `Init`);
/// the rest move it to `Failed`. See [`HandshakeError::is_recoverable`].
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Cannot {operation} while in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Token could not be decoded")]
    TokenDecode,

    #[error("Invalid invite: {0}")]
    InvalidInvite(&'static str),

    #[error("Session key rejected: {0}")]
    KeyImport(#[source] CryptoError),

    #[error("Token could not be encoded: {0}")]
    TokenEncode(#[from] TokenError),

    #[error("Remote descriptor rejected: {0}")]
    DescriptorRejected(String),

    #[error("Network gathering did not complete within {0:?}")]
    GatheringTimedOut(Duration),

    #[error("Connectivity lost")]
    ConnectivityLost,

    #[error("Session is not connected")]
    NotConnected,

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl HandshakeError {
    /// Whether the user can simply retry (e.g. paste the token again)
    /// without restarting the session.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. }
                | Self::TokenDecode
                | Self::InvalidInvite(_)
                | Self::KeyImport(_)
                | Self::NotConnected
                | Self::MessageTooLarge { .. }
        )
    }
}
