//! The pairing coordinator: one session, explicit transitions, no I/O.

use peerdrop_common::{
    FileMetadata, SessionCode, SessionError, SignalKind, SignalMessage, SignalPayload,
};
use tracing::{debug, info, warn};

use super::types::{
    CloseReason, Effect, NegotiationStep, PairingState, Progress, Role, SessionEvent, TimeoutKind,
};
use crate::session::Session;
use crate::transfer::{receive_frame, ReceiveOutcome};

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives at most one live [`Session`] through the pairing and transfer
/// lifecycle.
#[derive(Debug, Default)]
pub struct PairingCoordinator {
    relay_connected: bool,
    session: Option<Session>,
}

impl PairingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PairingState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(PairingState::Idle)
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn relay_connected(&self) -> bool {
        self.relay_connected
    }

    /// Which timer applies in the current state, if any.
    pub fn pending_timeout(&self) -> Option<TimeoutKind> {
        match self.state() {
            PairingState::Connecting => Some(TimeoutKind::Negotiation),
            PairingState::Transferring => Some(TimeoutKind::Stall),
            _ => None,
        }
    }

    // -- relay status -------------------------------------------------------

    pub fn on_relay_connected(&mut self) -> Vec<Effect> {
        self.relay_connected = true;
        vec![Effect::Emit(SessionEvent::RelayConnected)]
    }

    /// The session, if any, is left as it is.
    pub fn on_relay_disconnected(&mut self) -> Vec<Effect> {
        self.relay_connected = false;
        vec![Effect::Emit(SessionEvent::RelayDisconnected)]
    }

    // -- local commands -----------------------------------------------------

    /// Offer `metadata` under a new session, replacing any live one.
    pub fn create(&mut self, metadata: FileMetadata) -> Result<Vec<Effect>, SessionError> {
        self.require_relay()?;

        let mut effects = self.close();
        let mut session = Session::sender(metadata.clone());
        effects.push(transition(&mut session, PairingState::Created));
        effects.push(Effect::Relay(SignalMessage::create(&metadata)));
        info!(file = %metadata.name, size = metadata.size, "Creating session");
        self.session = Some(session);
        Ok(effects)
    }

    /// Join the session behind `code`, replacing any live one.
    pub fn join(&mut self, code: &str) -> Result<Vec<Effect>, SessionError> {
        self.require_relay()?;
        let code = SessionCode::parse(code)?;

        let mut effects = self.close();
        let mut session = Session::receiver(code.clone());
        effects.push(transition(&mut session, PairingState::AwaitingOffer));
        effects.push(Effect::Relay(SignalMessage::join(code.as_str())));
        info!(code = %code, "Joining session");
        self.session = Some(session);
        Ok(effects)
    }

    /// Accept the file on offer.
    pub fn accept(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require_relay()?;
        let session = self.offered_session("accept")?;

        let effects = vec![
            transition(session, PairingState::Accepted),
            Effect::Relay(SignalMessage::accept(session.code_str())),
        ];
        info!(code = %session.code_str(), "Offer accepted");
        Ok(effects)
    }

    /// Refuse the file on offer and end the session.
    pub fn decline(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require_relay()?;
        let session = self.offered_session("decline")?;
        let code = session.code_str().to_string();

        let mut effects = vec![Effect::Relay(SignalMessage::close(&code))];
        effects.extend(self.teardown(CloseReason::Declined));
        Ok(effects)
    }

    /// End the live session. Does nothing when there is none.
    pub fn close(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_ref().filter(|s| s.is_live()) else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let Some(code) = &session.code {
            if self.relay_connected {
                effects.push(Effect::Relay(SignalMessage::close(code.as_str())));
            }
        }
        effects.extend(self.teardown(CloseReason::Local));
        effects
    }

    // -- relay messages -----------------------------------------------------

    pub fn on_relay_message(&mut self, msg: SignalMessage) -> Vec<Effect> {
        let Some(session) = self.session.as_mut().filter(|s| s.is_live()) else {
            debug!(kind = ?msg.kind, "Relay message with no live session");
            return Vec::new();
        };

        if let (Some(ours), Some(theirs)) = (&session.code, msg.effective_code()) {
            if ours.as_str() != theirs {
                debug!(ours = %ours, theirs = %theirs, "Relay message for another session");
                return Vec::new();
            }
        }

        let role = session.role;
        let state = session.state;
        match msg.kind {
            SignalKind::Created => {
                if role != Role::Sender || state != PairingState::Created || session.code.is_some()
                {
                    return ignored(&msg, state);
                }
                let raw = msg.effective_code().unwrap_or_default();
                match SessionCode::parse(&raw) {
                    Ok(code) => {
                        info!(code = %code, "Session code assigned");
                        session.code = Some(code.clone());
                        vec![Effect::Emit(SessionEvent::CodeAssigned(code))]
                    }
                    Err(_) => self.teardown(CloseReason::RelayError(format!(
                        "relay assigned an invalid code: {raw:?}"
                    ))),
                }
            }
            SignalKind::ReceiverJoined => {
                if role != Role::Sender || state != PairingState::Created {
                    return ignored(&msg, state);
                }
                info!(code = %session.code_str(), "Receiver joined");
                vec![
                    transition(session, PairingState::PeerJoined),
                    Effect::Emit(SessionEvent::PeerJoined),
                ]
            }
            SignalKind::Joined => {
                if role != Role::Receiver || state != PairingState::AwaitingOffer {
                    return ignored(&msg, state);
                }
                match msg.metadata() {
                    Ok(metadata) => {
                        info!(file = %metadata.name, size = metadata.size, "File offered");
                        session.metadata = Some(metadata.clone());
                        vec![
                            transition(session, PairingState::Offered),
                            Effect::Emit(SessionEvent::Offered(metadata)),
                        ]
                    }
                    Err(e) => self.teardown(CloseReason::RelayError(format!(
                        "invalid file metadata: {e}"
                    ))),
                }
            }
            SignalKind::Accept => {
                if role == Role::Receiver {
                    warn!("Receiver got accept; only senders start negotiation");
                    return Vec::new();
                }
                if !matches!(state, PairingState::PeerJoined | PairingState::Created) {
                    return ignored(&msg, state);
                }
                info!(code = %session.code_str(), "Receiver accepted, negotiating");
                vec![
                    transition(session, PairingState::Connecting),
                    Effect::Negotiate(NegotiationStep::CreateOffer),
                ]
            }
            SignalKind::Offer => {
                if role == Role::Sender {
                    warn!("Sender got an offer; only receivers answer");
                    return Vec::new();
                }
                if state != PairingState::Accepted {
                    return ignored(&msg, state);
                }
                vec![
                    transition(session, PairingState::Connecting),
                    Effect::Negotiate(NegotiationStep::AnswerOffer(msg.payload)),
                ]
            }
            SignalKind::Answer => {
                if role == Role::Receiver {
                    warn!("Receiver got an answer; only senders offer");
                    return Vec::new();
                }
                if state != PairingState::Connecting {
                    return ignored(&msg, state);
                }
                vec![Effect::Negotiate(NegotiationStep::ApplyAnswer(msg.payload))]
            }
            SignalKind::IceCandidate => {
                vec![Effect::Negotiate(NegotiationStep::AddCandidate(msg.payload))]
            }
            SignalKind::Close => {
                let reason = CloseReason::PeerClosed(msg.error_text());
                self.teardown(reason)
            }
            SignalKind::Error => {
                let text = msg
                    .error_text()
                    .unwrap_or_else(|| "unknown relay error".to_string());
                self.teardown(CloseReason::RelayError(text))
            }
            SignalKind::Create | SignalKind::Join | SignalKind::Unknown => ignored(&msg, state),
        }
    }

    // -- negotiation results ------------------------------------------------

    /// The transport produced a local description; relay it as offer or answer.
    ///
    /// The channel may already be open by the time the description is
    /// reported, so it is still relayed once the transfer has started.
    pub fn on_local_description(&mut self, desc: SignalPayload) -> Vec<Effect> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let negotiating = matches!(
            session.state,
            PairingState::Connecting | PairingState::Transferring | PairingState::Complete
        );
        if !negotiating || session.code.is_none() {
            debug!(state = %session.state, "Dropping local description");
            return Vec::new();
        }
        let kind = match session.role {
            Role::Sender => SignalKind::Offer,
            Role::Receiver => SignalKind::Answer,
        };
        vec![Effect::Relay(SignalMessage::new(kind, session.code_str(), desc))]
    }

    pub fn on_local_candidate(&mut self, candidate: SignalPayload) -> Vec<Effect> {
        match self.session.as_ref() {
            Some(session) if session.is_live() && session.code.is_some() => {
                vec![Effect::Relay(SignalMessage::new(
                    SignalKind::IceCandidate,
                    session.code_str(),
                    candidate,
                ))]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_negotiation_failed(&mut self, error: impl Into<String>) -> Vec<Effect> {
        let error = error.into();
        warn!(error = %error, "Negotiation failed");
        self.teardown(CloseReason::NegotiationFailed(error))
    }

    // -- channel and transfer -----------------------------------------------

    /// The data channel opened. Only meaningful while `Connecting`.
    pub fn on_channel_open(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.state != PairingState::Connecting {
            return Vec::new();
        }

        info!(code = %session.code_str(), role = %session.role, "Data channel open");
        let mut effects = vec![transition(session, PairingState::Transferring)];
        if session.role == Role::Sender {
            if let Some(metadata) = session.metadata.clone() {
                session.transfer.begin(metadata);
            }
            effects.push(progress(session));
            effects.push(Effect::StartSending);
        }
        effects
    }

    /// A frame arrived on the data channel.
    pub fn on_channel_message(&mut self, bytes: &[u8]) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.role == Role::Sender {
            warn!(len = bytes.len(), "Sender ignoring inbound frame");
            return Vec::new();
        }
        if !matches!(
            session.state,
            PairingState::Transferring | PairingState::Complete
        ) {
            return Vec::new();
        }

        match receive_frame(&mut session.transfer, session.metadata.as_ref(), bytes) {
            Ok(ReceiveOutcome::Started) | Ok(ReceiveOutcome::Progress) => vec![progress(session)],
            Ok(ReceiveOutcome::Complete(file)) => {
                info!(file = %file.metadata.name, bytes = file.data.len(), "File received");
                vec![
                    progress(session),
                    transition(session, PairingState::Complete),
                    Effect::Emit(SessionEvent::FileReceived(file)),
                ]
            }
            Err(e) => {
                warn!(error = %e, "Rejecting transfer");
                self.teardown(CloseReason::ProtocolViolation(e.to_string()))
            }
        }
    }

    /// Cumulative bytes the sender task has handed to the channel.
    pub fn on_send_progress(&mut self, bytes: u64) -> Vec<Effect> {
        match self.session.as_mut() {
            Some(session)
                if session.role == Role::Sender && session.state == PairingState::Transferring =>
            {
                session.transfer.record_sent(bytes);
                vec![progress(session)]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_send_complete(&mut self) -> Vec<Effect> {
        match self.session.as_mut() {
            Some(session)
                if session.role == Role::Sender && session.state == PairingState::Transferring =>
            {
                session.transfer.mark_complete();
                vec![
                    progress(session),
                    transition(session, PairingState::Complete),
                    Effect::Emit(SessionEvent::SendComplete),
                ]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_transfer_failed(&mut self, error: impl Into<String>) -> Vec<Effect> {
        self.teardown(CloseReason::TransportFailed(error.into()))
    }

    /// The data channel closed or failed.
    pub fn on_channel_closed(&mut self, error: Option<String>) -> Vec<Effect> {
        match self.state() {
            PairingState::Connecting | PairingState::Transferring => {
                let error = error.unwrap_or_else(|| "data channel closed".to_string());
                self.teardown(CloseReason::TransportFailed(error))
            }
            PairingState::Complete => self.teardown(CloseReason::PeerClosed(None)),
            _ => Vec::new(),
        }
    }

    pub fn on_timeout(&mut self, kind: TimeoutKind) -> Vec<Effect> {
        if self.pending_timeout() != Some(kind) {
            return Vec::new();
        }
        warn!(?kind, state = %self.state(), "Session timed out");
        self.teardown(CloseReason::TimedOut(kind))
    }

    // -- internals ----------------------------------------------------------

    fn require_relay(&self) -> Result<(), SessionError> {
        if self.relay_connected {
            Ok(())
        } else {
            Err(SessionError::RelayUnavailable)
        }
    }

    fn offered_session(&mut self, operation: &'static str) -> Result<&mut Session, SessionError> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.is_live())
            .ok_or(SessionError::NoActiveSession)?;
        if session.role != Role::Receiver || session.state != PairingState::Offered {
            return Err(SessionError::InvalidState {
                operation,
                state: session.state.to_string(),
            });
        }
        Ok(session)
    }

    /// The single exit path of every session.
    fn teardown(&mut self, reason: CloseReason) -> Vec<Effect> {
        let Some(session) = self.session.as_mut().filter(|s| s.is_live()) else {
            return Vec::new();
        };

        info!(code = %session.code_str(), reason = %reason, "Session closed");
        session.transfer.discard_chunks();
        vec![
            Effect::Teardown,
            transition(session, PairingState::Closed),
            Effect::Emit(SessionEvent::Closed(reason)),
        ]
    }
}

fn transition(session: &mut Session, to: PairingState) -> Effect {
    debug!(from = %session.state, to = %to, role = %session.role, "State change");
    session.state = to;
    Effect::Emit(SessionEvent::StateChanged(to))
}

fn progress(session: &Session) -> Effect {
    Effect::Emit(SessionEvent::Progress(Progress {
        role: session.role,
        bytes_transferred: session.transfer.bytes_transferred(),
        total_bytes: session.transfer.total_bytes(),
        percent: session.transfer.progress_percent(),
    }))
}

fn ignored(msg: &SignalMessage, state: PairingState) -> Vec<Effect> {
    debug!(kind = ?msg.kind, state = %state, "Ignoring relay message");
    Vec::new()
}
