//! Handshake coordinator.
//!
//! Drives one session through either the host or the guest path:
//!
//! ```text
//! host:  Init -> HostGenerating -> HostWaitingForResponse -> Connected
//! guest: Init -> GuestProcessingInvite -> GuestAnswerReady -> Connected
//! ```
//!
//! Any active state may drop to `Failed`. Two things move the session
//! forward: transport events (gathering complete, channel open, messages,
//! connectivity loss) and tokens pasted by a human. Tokens are only emitted
//! after gathering completes, so they always describe a reachable endpoint.

use std::time::Duration;

use pairlink_crypto::{SessionKey, cipher};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::HandshakeConfig;
use crate::error::HandshakeError;
use crate::link::extract_token;
use crate::session::{Message, Sender, Session, SessionEvent, SessionState};
use crate::token::{self, TokenKind};
use crate::transport::{
    ChannelEvent, Descriptor, NegotiationRole, Transport, TransportError, TransportFactory,
};

/// Limits applied by the coordinator.
#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    /// Give up on candidate gathering after this long. `None` waits forever.
    pub gather_timeout: Option<Duration>,
    /// Largest plaintext accepted by [`HandshakeCoordinator::send`].
    pub max_message_bytes: usize,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        HandshakeConfig::default().settings()
    }
}

/// Sole entry point for the application: owns the session and its transport.
pub struct HandshakeCoordinator<F: TransportFactory> {
    factory: F,
    settings: HandshakeSettings,
    session: Session<F::Transport>,
}

impl<F: TransportFactory> HandshakeCoordinator<F> {
    pub fn new(factory: F, settings: HandshakeSettings) -> Self {
        Self {
            factory,
            settings,
            session: Session::new(),
        }
    }

    /// Create with default settings.
    pub fn with_defaults(factory: F) -> Self {
        Self::new(factory, HandshakeSettings::default())
    }

    pub const fn state(&self) -> SessionState {
        self.session.state
    }

    pub const fn session(&self) -> &Session<F::Transport> {
        &self.session
    }

    /// The token produced for the peer in the current session, if any.
    pub fn local_token(&self) -> Option<&str> {
        self.session.local_token()
    }

    // ------------------------------------------------------------------
    // Host path
    // ------------------------------------------------------------------

    /// Generate the session key, gather the local offer and return the
    /// invite token to share out of band.
    pub async fn start_host(&mut self) -> Result<String, HandshakeError> {
        self.require_state("start hosting", SessionState::Init)?;
        self.session.transition(SessionState::HostGenerating)?;
        info!("Starting host session");

        let key = SessionKey::generate();
        let gathering = match self.open_transport(NegotiationRole::Offerer, None) {
            Ok(rx) => rx,
            Err(e) => return Err(self.fail(e)),
        };
        let descriptor = match self.await_gathering(gathering).await {
            Ok(d) => d,
            Err(e) => return Err(self.fail(e)),
        };
        let invite = match token::encode_invite(&descriptor, &key) {
            Ok(t) => t,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.session.key = Some(key);
        self.session.transition(SessionState::HostWaitingForResponse)?;
        self.session.local_token = Some(invite.clone());
        info!(token_len = invite.len(), "Invite ready");
        Ok(invite)
    }

    /// Apply the guest's response token.
    ///
    /// A token that does not decode, or that is not a response, leaves the
    /// session waiting so the user can paste again. A descriptor the
    /// transport refuses fails the session.
    pub fn accept_response(&mut self, input: &str) -> Result<(), HandshakeError> {
        self.require_state("accept a response", SessionState::HostWaitingForResponse)?;
        if self.session.remote_applied {
            warn!("A response was already applied; ignoring another");
            return Err(HandshakeError::InvalidState {
                operation: "accept a second response",
                state: self.session.state,
            });
        }

        let Some(decoded) = token::decode(&extract_token(input)) else {
            warn!("Response token could not be decoded");
            return Err(HandshakeError::TokenDecode);
        };
        if decoded.kind != TokenKind::Response || decoded.key.is_some() {
            warn!(kind = ?decoded.kind, "Pasted token is not a response");
            return Err(HandshakeError::TokenDecode);
        }

        let Some(channel) = self.session.channel.as_mut() else {
            return Err(self.fail(HandshakeError::NotConnected));
        };
        if let Err(e) = channel.set_remote_descriptor(&decoded.descriptor) {
            return Err(self.fail(descriptor_error(e)));
        }
        self.session.remote_applied = true;
        info!("Remote answer applied; waiting for channel");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Guest path
    // ------------------------------------------------------------------

    /// Import the host's invite, gather the local answer and return the
    /// response token to send back.
    ///
    /// An unusable invite returns the session to `Init` with nothing retained.
    pub async fn load_invite(&mut self, input: &str) -> Result<String, HandshakeError> {
        use HandshakeError::InvalidInvite;

        self.require_state("load an invite", SessionState::Init)?;
        self.session.transition(SessionState::GuestProcessingInvite)?;
        info!("Loading invite");

        let decoded = match token::decode(&extract_token(input)) {
            Some(d) if d.kind == TokenKind::Invite => d,
            Some(_) => return Err(self.reject_invite(InvalidInvite("token is not an invite"))),
            None => return Err(self.reject_invite(InvalidInvite("token could not be decoded"))),
        };
        let Some(raw_key) = decoded.key.as_ref() else {
            return Err(self.reject_invite(InvalidInvite("invite carries no key")));
        };
        let key = match SessionKey::import(raw_key) {
            Ok(k) => k,
            Err(e) => return Err(self.reject_invite(HandshakeError::KeyImport(e))),
        };
        self.session.key = Some(key);

        let gathering =
            match self.open_transport(NegotiationRole::Answerer, Some(&decoded.descriptor)) {
                Ok(rx) => rx,
                Err(e) => return Err(self.fail(e)),
            };
        let descriptor = match self.await_gathering(gathering).await {
            Ok(d) => d,
            Err(e) => return Err(self.fail(e)),
        };

        let response = match token::encode_response(&descriptor) {
            Ok(t) => t,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.session.transition(SessionState::GuestAnswerReady)?;
        self.session.local_token = Some(response.clone());
        info!(token_len = response.len(), "Response ready");
        Ok(response)
    }

    // ------------------------------------------------------------------
    // Channel
    // ------------------------------------------------------------------

    /// Wait for the next thing the application should see.
    ///
    /// Returns `None` when no transport is attached (`Init`, or after the
    /// session failed and released its resources). Messages that fail
    /// authentication are dropped and counted; they never end the session.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let event = self.session.events.as_mut()?.recv().await;
            let state = self.session.state;

            match event {
                Some(ChannelEvent::Open) => {
                    if matches!(
                        state,
                        SessionState::HostWaitingForResponse | SessionState::GuestAnswerReady
                    ) {
                        self.session.transition(SessionState::Connected).ok()?;
                        info!("Channel open; session connected");
                        return Some(SessionEvent::Connected);
                    }
                    debug!(?state, "Ignoring channel open");
                }
                Some(ChannelEvent::Message(frame)) => {
                    if let Some(message) = self.open_frame(&frame) {
                        return Some(SessionEvent::Message(message));
                    }
                }
                Some(ChannelEvent::ConnectivityLost) | None => {
                    if state.is_idle() {
                        return None;
                    }
                    let error = self.fail(HandshakeError::ConnectivityLost);
                    return Some(SessionEvent::Failed(error));
                }
            }
        }
    }

    /// Drive events until the channel opens.
    pub async fn wait_connected(&mut self) -> Result<(), HandshakeError> {
        if self.session.state == SessionState::Connected {
            return Ok(());
        }
        while let Some(event) = self.next_event().await {
            match event {
                SessionEvent::Connected => return Ok(()),
                SessionEvent::Failed(e) => return Err(e),
                SessionEvent::Message(_) => {}
            }
        }
        Err(HandshakeError::NotConnected)
    }

    /// Encrypt and send a text message.
    pub fn send(&mut self, text: &str) -> Result<Message, HandshakeError> {
        self.require_state("send", SessionState::Connected)
            .map_err(|_| HandshakeError::NotConnected)?;
        if text.len() > self.settings.max_message_bytes {
            return Err(HandshakeError::MessageTooLarge {
                size: text.len(),
                max: self.settings.max_message_bytes,
            });
        }

        let (Some(key), Some(channel)) = (self.session.key.as_ref(), self.session.channel.as_mut())
        else {
            return Err(HandshakeError::NotConnected);
        };
        let frame = cipher::encrypt(key, text)?.to_frame();
        match channel.send(frame) {
            Ok(()) => Ok(Message::new(Sender::Local, text)),
            Err(TransportError::ChannelClosed) => Err(self.fail(HandshakeError::ConnectivityLost)),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the transport, wipe the key and start over from `Init`.
    pub fn terminate(&mut self) {
        info!(state = ?self.session.state, "Terminating session");
        self.session = Session::new();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_state(
        &self,
        operation: &'static str,
        expected: SessionState,
    ) -> Result<(), HandshakeError> {
        if self.session.state == expected {
            Ok(())
        } else {
            Err(HandshakeError::InvalidState {
                operation,
                state: self.session.state,
            })
        }
    }

    /// Create the transport for this session, subscribe to its events and
    /// start gathering. The guest sets the host's offer before answering.
    fn open_transport(
        &mut self,
        role: NegotiationRole,
        remote: Option<&Descriptor>,
    ) -> Result<oneshot::Receiver<Descriptor>, HandshakeError> {
        let transport = self.factory.create()?;
        let channel = self.session.channel.insert(transport);
        self.session.events = Some(channel.subscribe());

        if let Some(remote) = remote {
            channel
                .set_remote_descriptor(remote)
                .map_err(descriptor_error)?;
            self.session.remote_applied = true;
        }
        let gathering = channel.create_local_descriptor(role)?;
        debug!(?role, "Gathering local descriptor");
        Ok(gathering)
    }

    async fn await_gathering(
        &self,
        gathering: oneshot::Receiver<Descriptor>,
    ) -> Result<Descriptor, HandshakeError> {
        let gathered = match self.settings.gather_timeout {
            Some(limit) => tokio::time::timeout(limit, gathering)
                .await
                .map_err(|_| HandshakeError::GatheringTimedOut(limit))?,
            None => gathering.await,
        };
        let descriptor = gathered.map_err(|_| TransportError::GatheringAborted)?;
        if descriptor.is_empty() {
            let reason = "gathering produced an empty descriptor".to_string();
            return Err(TransportError::Other(reason).into());
        }
        debug!(kind = ?descriptor.kind, sdp_len = descriptor.sdp.len(), "Gathering complete");
        Ok(descriptor)
    }

    fn open_frame(&mut self, frame: &[u8]) -> Option<Message> {
        if self.session.state != SessionState::Connected {
            warn!(state = ?self.session.state, "Dropping message received before connect");
            return None;
        }
        let key = self.session.key.as_ref()?;
        match cipher::decrypt_frame(key, frame) {
            Ok(text) => Some(Message::new(Sender::Remote, text)),
            Err(e) => {
                self.session.dropped_messages += 1;
                warn!(
                    error = %e,
                    frame_len = frame.len(),
                    dropped = self.session.dropped_messages,
                    "Dropping message that failed authentication"
                );
                None
            }
        }
    }

    /// Move to `Failed` and release the transport and key.
    fn fail(&mut self, error: HandshakeError) -> HandshakeError {
        warn!(state = ?self.session.state, error = %error, "Session failed");
        if self.session.transition(SessionState::Failed).is_err() {
            self.session.state = SessionState::Failed;
        }
        self.session.release();
        error
    }

    /// Undo a partially loaded invite: back to `Init`, nothing retained.
    fn reject_invite(&mut self, error: HandshakeError) -> HandshakeError {
        warn!(error = %error, "Invite rejected");
        self.session = Session::new();
        error
    }
}

fn descriptor_error(error: TransportError) -> HandshakeError {
    match error {
        TransportError::DescriptorRejected(reason) => HandshakeError::DescriptorRejected(reason),
        other => other.into(),
    }
}
