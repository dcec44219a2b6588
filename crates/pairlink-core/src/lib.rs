//! `pairlink` Core Library
//!
//! Serverless two-party pairing: the host and guest exchange two tokens out
//! of band, then talk over an end-to-end encrypted point-to-point channel.
//!
//! - Handshake coordinator and session state machine
//! - Token codec (compressed, base64url, with legacy fallbacks)
//! - Invite links
//! - Transport contract plus an in-process loopback transport
//! - Configuration resolution and tracing setup

pub mod config;
pub mod coordinator;
pub mod error;
pub mod link;
pub mod loopback;
pub mod session;
pub mod token;
pub mod tracing_init;
pub mod transport;

pub use config::Config;
pub use coordinator::{HandshakeCoordinator, HandshakeSettings};
pub use error::{Error, HandshakeError, Result};
pub use link::{extract_token, invite_link};
pub use loopback::{GatherMode, LoopbackNetwork, LoopbackTransport};
pub use session::{Message, Sender, Session, SessionEvent, SessionState};
pub use token::{DecodedToken, TokenFormat, TokenKind};
pub use transport::{
    ChannelEvent, Descriptor, DescriptorType, NegotiationRole, Transport, TransportError,
    TransportFactory,
};
