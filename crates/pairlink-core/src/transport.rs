//! Point-to-point transport contract.
//!
//! The coordinator never negotiates connectivity itself. It asks a
//! [`Transport`] for a local descriptor, waits for candidate gathering to
//! finish, hands over the peer's descriptor, and then listens to
//! [`ChannelEvent`]s.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Which side of the offer/answer exchange a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorType {
    Offer,
    Answer,
}

/// Connection parameters for one endpoint, produced by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub kind: DescriptorType,
    pub sdp: String,
}

impl Descriptor {
    pub fn new(kind: DescriptorType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    /// A descriptor with no session description carries nothing to connect to.
    pub fn is_empty(&self) -> bool {
        self.sdp.trim().is_empty()
    }
}

/// Role requested when creating the local descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Offerer,
    Answerer,
}

impl NegotiationRole {
    pub const fn descriptor_type(self) -> DescriptorType {
        match self {
            Self::Offerer => DescriptorType::Offer,
            Self::Answerer => DescriptorType::Answer,
        }
    }
}

/// Events delivered by the transport once negotiation is under way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The data channel is open in both directions.
    Open,
    /// One frame received from the peer.
    Message(Vec<u8>),
    /// The peer went away or the path failed.
    ConnectivityLost,
}

/// Errors that can occur in the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Descriptor rejected: {0}")]
    DescriptorRejected(String),

    #[error("Gathering aborted before a descriptor was produced")]
    GatheringAborted,

    #[error("Channel is not open")]
    ChannelClosed,

    #[error("Transport failure: {0}")]
    Other(String),
}

/// One side of a point-to-point connection attempt.
///
/// A transport instance lives for exactly one session and is closed when the
/// session is discarded.
pub trait Transport: Send {
    /// Take the channel event stream. Called once, before negotiation starts.
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChannelEvent>;

    /// Start building the local descriptor.
    ///
    /// The returned receiver resolves exactly once, when gathering has
    /// completed and the descriptor is final. Dropping the sender without a
    /// value means gathering was aborted.
    fn create_local_descriptor(
        &mut self,
        role: NegotiationRole,
    ) -> Result<oneshot::Receiver<Descriptor>, TransportError>;

    /// Hand the peer's descriptor to the transport.
    fn set_remote_descriptor(&mut self, remote: &Descriptor) -> Result<(), TransportError>;

    /// Send one frame over the open channel.
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Tear down the connection. Must be idempotent.
    fn close(&mut self);
}

/// Creates a fresh transport for every new session.
pub trait TransportFactory: Send {
    type Transport: Transport;

    fn create(&mut self) -> Result<Self::Transport, TransportError>;
}
