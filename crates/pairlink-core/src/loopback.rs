//! In-process transport for demos and tests.
//!
//! Every [`LoopbackTransport`] created by the same [`LoopbackNetwork`] is an
//! endpoint in a shared registry. Descriptors name their endpoint with an
//! `a=endpoint:<id>` line; the channel opens once two endpoints have each
//! accepted the other's descriptor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::transport::{
    ChannelEvent, Descriptor, DescriptorType, NegotiationRole, Transport, TransportError,
    TransportFactory,
};

/// How candidate gathering behaves for endpoints of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherMode {
    /// Complete after the given delay (zero yields once to the scheduler).
    After(Duration),
    /// Never complete; the descriptor is only released by closing.
    Stall,
    /// Abort immediately without producing a descriptor.
    Abort,
}

impl Default for GatherMode {
    fn default() -> Self {
        Self::After(Duration::ZERO)
    }
}

struct Endpoint {
    role: Option<DescriptorType>,
    remote: Option<u64>,
    events: Option<mpsc::UnboundedSender<ChannelEvent>>,
    open: bool,
}

impl Endpoint {
    fn notify(&self, event: ChannelEvent) {
        if let Some(tx) = &self.events {
            // The receiver is gone once its session has been released.
            let _ = tx.send(event);
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    endpoints: HashMap<u64, Endpoint>,
}

/// Thread-safe registry of loopback endpoints. Cheap to clone.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    registry: Arc<Mutex<Registry>>,
    gather: GatherMode,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Network whose endpoints gather according to `mode`.
    pub fn with_gather_mode(mode: GatherMode) -> Self {
        Self {
            registry: Arc::default(),
            gather: mode,
        }
    }

    /// Deliver a raw frame to an endpoint as if its peer had sent it.
    pub fn inject(&self, endpoint: u64, frame: Vec<u8>) -> Result<(), TransportError> {
        let registry = self.lock()?;
        let target = registry
            .endpoints
            .get(&endpoint)
            .ok_or(TransportError::ChannelClosed)?;
        target.notify(ChannelEvent::Message(frame));
        Ok(())
    }

    /// Number of endpoints that have not been closed.
    pub fn endpoint_count(&self) -> usize {
        self.lock().map_or(0, |r| r.endpoints.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>, TransportError> {
        self.registry
            .lock()
            .map_err(|_| TransportError::Other("loopback registry poisoned".to_string()))
    }
}

impl TransportFactory for LoopbackNetwork {
    type Transport = LoopbackTransport;

    fn create(&mut self) -> Result<LoopbackTransport, TransportError> {
        let mut registry = self.lock()?;
        registry.next_id += 1;
        let id = registry.next_id;
        registry.endpoints.insert(
            id,
            Endpoint {
                role: None,
                remote: None,
                events: None,
                open: false,
            },
        );
        drop(registry);
        debug!(endpoint = id, "Loopback endpoint created");
        Ok(LoopbackTransport {
            id,
            network: self.clone(),
            stalled: None,
            closed: false,
        })
    }
}

/// One endpoint of a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    id: u64,
    network: LoopbackNetwork,
    /// Held open in [`GatherMode::Stall`] so the receiver keeps waiting.
    stalled: Option<oneshot::Sender<Descriptor>>,
    closed: bool,
}

impl LoopbackTransport {
    pub const fn id(&self) -> u64 {
        self.id
    }

    fn describe(&self, kind: DescriptorType) -> Descriptor {
        let setup = match kind {
            DescriptorType::Offer => "actpass",
            DescriptorType::Answer => "active",
        };
        let sdp = format!(
            "v=0\r\no=- {id} 2 IN IP4 127.0.0.1\r\ns=-\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=setup:{setup}\r\na=endpoint:{id}\r\n",
            id = self.id
        );
        Descriptor::new(kind, sdp)
    }
}

/// Find the `a=endpoint:` attribute of a session description.
fn endpoint_of(descriptor: &Descriptor) -> Option<u64> {
    descriptor
        .sdp
        .lines()
        .find_map(|line| line.trim().strip_prefix("a=endpoint:"))
        .and_then(|id| id.trim().parse().ok())
}

impl Transport for LoopbackTransport {
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.network.lock() {
            Ok(mut registry) => {
                if let Some(endpoint) = registry.endpoints.get_mut(&self.id) {
                    endpoint.events = Some(tx);
                }
            }
            Err(e) => warn!(endpoint = self.id, error = %e, "Subscribe failed"),
        }
        rx
    }

    fn create_local_descriptor(
        &mut self,
        role: NegotiationRole,
    ) -> Result<oneshot::Receiver<Descriptor>, TransportError> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        let kind = role.descriptor_type();
        {
            let mut registry = self.network.lock()?;
            let endpoint = registry
                .endpoints
                .get_mut(&self.id)
                .ok_or(TransportError::ChannelClosed)?;
            endpoint.role = Some(kind);
        }

        let (tx, rx) = oneshot::channel();
        let descriptor = self.describe(kind);
        match self.network.gather {
            GatherMode::After(delay) => {
                let id = self.id;
                tokio::spawn(async move {
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                    debug!(endpoint = id, "Loopback gathering complete");
                    let _ = tx.send(descriptor);
                });
            }
            GatherMode::Stall => self.stalled = Some(tx),
            GatherMode::Abort => drop(tx),
        }
        Ok(rx)
    }

    fn set_remote_descriptor(&mut self, remote: &Descriptor) -> Result<(), TransportError> {
        let reject = |reason: &str| Err(TransportError::DescriptorRejected(reason.to_string()));

        let Some(peer_id) = endpoint_of(remote) else {
            return reject("descriptor names no endpoint");
        };
        if peer_id == self.id {
            return reject("descriptor refers to this endpoint");
        }

        let mut registry = self.network.lock()?;
        let Some(peer) = registry.endpoints.get(&peer_id) else {
            return reject("unknown endpoint");
        };
        if peer.role.is_some_and(|role| role != remote.kind) {
            return reject("descriptor type does not match its endpoint");
        }
        let peer_links_back = peer.remote == Some(self.id);

        let Some(local) = registry.endpoints.get_mut(&self.id) else {
            return Err(TransportError::ChannelClosed);
        };
        if local.open {
            return reject("channel already negotiated");
        }
        if local.role == Some(remote.kind) {
            return reject("both descriptors have the same type");
        }
        local.remote = Some(peer_id);
        debug!(endpoint = self.id, peer = peer_id, "Remote descriptor set");

        if peer_links_back {
            for id in [self.id, peer_id] {
                if let Some(endpoint) = registry.endpoints.get_mut(&id) {
                    endpoint.open = true;
                    endpoint.notify(ChannelEvent::Open);
                }
            }
            info!(a = self.id, b = peer_id, "Loopback channel open");
        }
        Ok(())
    }

    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        let registry = self.network.lock()?;
        let peer = registry
            .endpoints
            .get(&self.id)
            .filter(|local| local.open)
            .and_then(|local| local.remote)
            .and_then(|peer_id| registry.endpoints.get(&peer_id))
            .ok_or(TransportError::ChannelClosed)?;
        peer.notify(ChannelEvent::Message(frame));
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stalled = None;

        let Ok(mut registry) = self.network.lock() else {
            return;
        };
        let Some(local) = registry.endpoints.remove(&self.id) else {
            return;
        };
        if let Some(peer) = local.remote.and_then(|id| registry.endpoints.get(&id))
            && peer.remote == Some(self.id)
        {
            peer.notify(ChannelEvent::ConnectivityLost);
        }
        debug!(endpoint = self.id, "Loopback endpoint closed");
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}
