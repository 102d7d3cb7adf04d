//! States, effects, and events of the pairing state machine.

use std::fmt;

use peerdrop_common::{FileMetadata, SessionCode, SignalMessage, SignalPayload};

use crate::transfer::ReceivedFile;

// ---------------------------------------------------------------------------
// Roles and states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
        }
    }
}

/// Where a session stands.
///
/// Sender: `Idle → Created → PeerJoined → Connecting → Transferring → Complete`.
/// Receiver: `Idle → AwaitingOffer → Offered → Accepted → Connecting →
/// Transferring → Complete`. Any state may go to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Created,
    PeerJoined,
    AwaitingOffer,
    Offered,
    Accepted,
    Connecting,
    Transferring,
    Complete,
    Closed,
}

impl PairingState {
    /// Whether a session in this state still holds resources worth tearing down.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Idle | Self::Closed)
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Created => "waiting for receiver",
            Self::PeerJoined => "receiver joined",
            Self::AwaitingOffer => "waiting for offer",
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::Connecting => "connecting",
            Self::Transferring => "transferring",
            Self::Complete => "complete",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A negotiation action for the session's transport.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationStep {
    /// Create an offer and apply it locally (sender only).
    CreateOffer,
    /// Apply the remote offer, create an answer, apply it locally (receiver only).
    AnswerOffer(SignalPayload),
    ApplyAnswer(SignalPayload),
    AddCandidate(SignalPayload),
}

/// Work the runtime performs on the coordinator's behalf, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Relay(SignalMessage),
    Negotiate(NegotiationStep),
    /// Open the source file and start streaming it over the channel.
    StartSending,
    /// Stop the sender task, close the channel and transport.
    Teardown,
    Emit(SessionEvent),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Too long in `Connecting`.
    Negotiation,
    /// No progress while `Transferring`.
    Stall,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the local user.
    Local,
    /// The receiver declined the offer.
    Declined,
    /// The peer closed, or the relay reported the peer gone.
    PeerClosed(Option<String>),
    /// The relay answered with an error.
    RelayError(String),
    NegotiationFailed(String),
    ProtocolViolation(String),
    /// The data channel dropped or failed mid-session.
    TransportFailed(String),
    TimedOut(TimeoutKind),
}

impl CloseReason {
    /// Text shown to the user. A protocol violation reads the same as a peer close.
    pub fn user_message(&self) -> String {
        match self {
            Self::Local => "session closed".into(),
            Self::Declined => "transfer declined".into(),
            Self::PeerClosed(_) | Self::ProtocolViolation(_) => "connection closed".into(),
            Self::RelayError(msg) => msg.clone(),
            Self::NegotiationFailed(_) => "could not establish a direct connection".into(),
            Self::TransportFailed(_) => "connection lost".into(),
            Self::TimedOut(TimeoutKind::Negotiation) => "timed out while connecting".into(),
            Self::TimedOut(TimeoutKind::Stall) => "transfer stalled".into(),
        }
    }

    /// Whether the session ended without a problem.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Local | Self::Declined | Self::PeerClosed(None))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "closed locally"),
            Self::Declined => write!(f, "declined"),
            Self::PeerClosed(None) => write!(f, "peer closed"),
            Self::PeerClosed(Some(msg)) => write!(f, "peer closed: {msg}"),
            Self::RelayError(msg) => write!(f, "relay error: {msg}"),
            Self::NegotiationFailed(msg) => write!(f, "negotiation failed: {msg}"),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {msg}"),
            Self::TransportFailed(msg) => write!(f, "transport failed: {msg}"),
            Self::TimedOut(kind) => write!(f, "timed out ({kind:?})"),
        }
    }
}

/// A progress snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub role: Role,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

/// Events surfaced to the user of a client.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RelayConnected,
    RelayDisconnected,
    StateChanged(PairingState),
    /// The relay assigned a code to the sender's session.
    CodeAssigned(SessionCode),
    /// A receiver joined the sender's session.
    PeerJoined,
    /// The receiver was offered this file.
    Offered(FileMetadata),
    Progress(Progress),
    SendComplete,
    FileReceived(ReceivedFile),
    /// Non-fatal problem, e.g. a command rejected while the relay is down.
    Warning(String),
    Closed(CloseReason),
}
