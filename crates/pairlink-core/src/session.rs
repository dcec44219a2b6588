//! Session state owned by the handshake coordinator.
//!
//! A `Session` lives for one connection attempt. It is never resumed: on
//! termination it is released (transport closed, key wiped) and replaced by
//! a fresh one in `Init`.

use std::time::{SystemTime, UNIX_EPOCH};

use pairlink_crypto::SessionKey;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::HandshakeError;
use crate::transport::{ChannelEvent, Transport};

/// Handshake progress for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    HostGenerating,
    HostWaitingForResponse,
    GuestProcessingInvite,
    GuestAnswerReady,
    Connected,
    Failed,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Returning to `Init` through termination is not a transition; it
    /// replaces the whole session.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{
            Connected, Failed, GuestAnswerReady, GuestProcessingInvite, HostGenerating,
            HostWaitingForResponse, Init,
        };
        matches!(
            (self, next),
            (Init, HostGenerating | GuestProcessingInvite)
                | (HostGenerating, HostWaitingForResponse | Failed)
                | (HostWaitingForResponse, Connected | Failed)
                | (GuestProcessingInvite, GuestAnswerReady | Init | Failed)
                | (GuestAnswerReady, Connected | Failed)
                | (Connected, Failed)
        )
    }

    /// No transport activity is expected in these states.
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Init | Self::Failed)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Local,
    Remote,
}

/// One chat message. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp_ms: unix_timestamp_ms(),
        }
    }
}

fn unix_timestamp_ms() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}

/// What the application observes while a session runs.
#[derive(Debug)]
pub enum SessionEvent {
    /// The channel opened; messages can flow.
    Connected,
    /// A message from the peer, already decrypted.
    Message(Message),
    /// The session reached `Failed` and must be terminated.
    Failed(HandshakeError),
}

/// Mutable record for one connection attempt.
pub struct Session<T: Transport> {
    pub(crate) state: SessionState,
    pub(crate) key: Option<SessionKey>,
    pub(crate) channel: Option<T>,
    pub(crate) events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    /// Token produced for the peer, kept so it can be shown again.
    pub(crate) local_token: Option<String>,
    /// The peer's descriptor has been handed to the transport.
    pub(crate) remote_applied: bool,
    pub(crate) dropped_messages: u64,
}

impl<T: Transport> Default for Session<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Session<T> {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Init,
            key: None,
            channel: None,
            events: None,
            local_token: None,
            remote_applied: false,
            dropped_messages: 0,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub const fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub const fn channel(&self) -> Option<&T> {
        self.channel.as_ref()
    }

    pub fn local_token(&self) -> Option<&str> {
        self.local_token.as_deref()
    }

    /// Inbound messages discarded because they failed authentication.
    pub const fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    /// True when nothing beyond the initial state has been populated.
    pub const fn is_pristine(&self) -> bool {
        matches!(self.state, SessionState::Init)
            && self.key.is_none()
            && self.channel.is_none()
            && self.events.is_none()
            && self.local_token.is_none()
            && !self.remote_applied
    }

    pub(crate) fn transition(&mut self, next: SessionState) -> Result<(), HandshakeError> {
        if !self.state.can_transition_to(next) {
            return Err(HandshakeError::InvalidState {
                operation: "change state",
                state: self.state,
            });
        }
        debug!(from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Close the transport and wipe the key. The state is left untouched.
    pub(crate) fn release(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.events = None;
        // SessionKey zeroizes itself on drop.
        self.key = None;
        self.local_token = None;
        self.remote_applied = false;
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_path_transitions_are_allowed() {
        assert!(SessionState::Init.can_transition_to(SessionState::HostGenerating));
        assert!(SessionState::HostGenerating.can_transition_to(SessionState::HostWaitingForResponse));
        assert!(SessionState::HostWaitingForResponse.can_transition_to(SessionState::Connected));
    }

    #[test]
    fn guest_path_transitions_are_allowed() {
        assert!(SessionState::Init.can_transition_to(SessionState::GuestProcessingInvite));
        assert!(SessionState::GuestProcessingInvite.can_transition_to(SessionState::GuestAnswerReady));
        assert!(SessionState::GuestProcessingInvite.can_transition_to(SessionState::Init));
        assert!(SessionState::GuestAnswerReady.can_transition_to(SessionState::Connected));
    }

    #[test]
    fn every_active_state_can_fail() {
        for state in [
            SessionState::HostGenerating,
            SessionState::HostWaitingForResponse,
            SessionState::GuestProcessingInvite,
            SessionState::GuestAnswerReady,
            SessionState::Connected,
        ] {
            assert!(state.can_transition_to(SessionState::Failed), "{state:?}");
        }
    }

    #[test]
    fn failed_is_terminal() {
        for next in [
            SessionState::Init,
            SessionState::HostGenerating,
            SessionState::GuestProcessingInvite,
            SessionState::Connected,
        ] {
            assert!(!SessionState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn roles_cannot_cross() {
        assert!(!SessionState::HostGenerating.can_transition_to(SessionState::GuestAnswerReady));
        assert!(!SessionState::GuestAnswerReady.can_transition_to(SessionState::HostWaitingForResponse));
        assert!(!SessionState::Init.can_transition_to(SessionState::Connected));
        assert!(!SessionState::Connected.can_transition_to(SessionState::Init));
    }

    #[test]
    fn idle_states() {
        assert!(SessionState::Init.is_idle());
        assert!(SessionState::Failed.is_idle());
        assert!(!SessionState::Connected.is_idle());
    }

    #[test]
    fn messages_get_unique_ids() {
        let a = Message::new(Sender::Local, "hi");
        let b = Message::new(Sender::Local, "hi");
        assert_ne!(a.id, b.id);
        assert!(a.timestamp_ms > 0);
    }
}
