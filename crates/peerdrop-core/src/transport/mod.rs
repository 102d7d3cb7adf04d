//! Direct peer transport capability.
//!
//! The pairing layer only ever talks to a transport through
//! [`PeerTransport`]: produce and apply descriptions, apply remote
//! candidates, close. Local candidates and the data channel lifecycle come
//! back as [`TransportEvent`]s on the channel handed to the factory.

mod channel;
pub mod memory;
pub mod tcp;

pub use channel::{ChannelHandle, DataChannel};
pub use memory::MemoryNetwork;
pub use tcp::{TcpTransportConfig, TcpTransportFactory};

use async_trait::async_trait;
use peerdrop_common::{SignalPayload, TransportError};
use tokio::sync::mpsc;

/// Asynchronous notifications from a transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local connectivity candidate to relay to the peer.
    LocalCandidate(SignalPayload),
    ChannelOpen(ChannelHandle),
    ChannelMessage(Vec<u8>),
    ChannelClosed,
    ChannelError(String),
}

/// One peer connection attempt. Descriptions and candidates are opaque to
/// everything but the transport that produced them.
#[async_trait]
pub trait PeerTransport: Send {
    async fn create_offer(&mut self) -> Result<SignalPayload, TransportError>;

    async fn create_answer(&mut self) -> Result<SignalPayload, TransportError>;

    async fn set_local_description(&mut self, desc: SignalPayload) -> Result<(), TransportError>;

    async fn set_remote_description(&mut self, desc: SignalPayload)
        -> Result<(), TransportError>;

    async fn add_remote_candidate(&mut self, candidate: SignalPayload)
        -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// Builds a fresh transport for each session.
pub trait TransportFactory: Send + Sync + 'static {
    fn create(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn PeerTransport>;
}

/// `type` field of a description payload.
pub(crate) fn description_kind(desc: &SignalPayload) -> Option<&str> {
    desc.get("type").and_then(|v| v.as_str())
}

/// `token` field of a description payload.
pub(crate) fn description_token(desc: &SignalPayload) -> Result<String, TransportError> {
    desc.get("token")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TransportError::Negotiation("description has no token".into()))
}
