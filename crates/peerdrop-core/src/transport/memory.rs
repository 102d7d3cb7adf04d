//! In-process transport.
//!
//! Peers that share a [`MemoryNetwork`] rendezvous on the token carried in
//! the offer. Frames are delivered through the peer's own event channel, so
//! ordering and reliability come from `mpsc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use peerdrop_common::{SignalPayload, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{
    description_kind, description_token, ChannelHandle, DataChannel, PeerTransport,
    TransportEvent, TransportFactory,
};

struct Rendezvous {
    offerer_events: mpsc::Sender<TransportEvent>,
    offerer_channel: Option<ChannelHandle>,
}

/// Shared switchboard for memory transports.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    rendezvous: Arc<Mutex<HashMap<String, Rendezvous>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of offers waiting for (or holding) a connection.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Rendezvous>> {
        self.rendezvous.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransportFactory for MemoryNetwork {
    fn create(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn PeerTransport> {
        Box::new(MemoryTransport {
            network: self.clone(),
            events,
            offered: None,
            remote: None,
            channel: None,
        })
    }
}

struct MemoryDataChannel {
    peer_events: mpsc::Sender<TransportEvent>,
}

#[async_trait]
impl DataChannel for MemoryDataChannel {
    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.peer_events
            .send(TransportEvent::ChannelMessage(data))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn close(&self) {
        let _ = self.peer_events.send(TransportEvent::ChannelClosed).await;
    }
}

struct MemoryTransport {
    network: MemoryNetwork,
    events: mpsc::Sender<TransportEvent>,
    /// Token this side registered as offerer.
    offered: Option<String>,
    /// Token from the remote offer, when answering.
    remote: Option<String>,
    channel: Option<ChannelHandle>,
}

impl MemoryTransport {
    async fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event).await;
    }

    /// Answerer side: build both ends and park the offerer's end for pickup.
    async fn connect(&mut self, token: &str) -> Result<(), TransportError> {
        let local = {
            let mut map = self.network.lock();
            let slot = map
                .get_mut(token)
                .ok_or_else(|| TransportError::Negotiation(format!("unknown offer {token}")))?;
            if slot.offerer_channel.is_some() {
                return Err(TransportError::Negotiation("offer already answered".into()));
            }

            let to_offerer = ChannelHandle::new(Arc::new(MemoryDataChannel {
                peer_events: slot.offerer_events.clone(),
            }));
            let to_answerer = ChannelHandle::new(Arc::new(MemoryDataChannel {
                peer_events: self.events.clone(),
            }));
            slot.offerer_channel = Some(to_answerer);
            to_offerer
        };

        debug!(token, "Memory channel connected");
        self.channel = Some(local.clone());
        self.emit(TransportEvent::ChannelOpen(local)).await;
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn create_offer(&mut self) -> Result<SignalPayload, TransportError> {
        let token = Uuid::new_v4().to_string();
        self.network.lock().insert(
            token.clone(),
            Rendezvous {
                offerer_events: self.events.clone(),
                offerer_channel: None,
            },
        );
        self.offered = Some(token.clone());
        Ok(serde_json::json!({ "type": "offer", "token": token }))
    }

    async fn create_answer(&mut self) -> Result<SignalPayload, TransportError> {
        let token = self
            .remote
            .clone()
            .ok_or_else(|| TransportError::Negotiation("no remote offer".into()))?;
        Ok(serde_json::json!({ "type": "answer", "token": token }))
    }

    async fn set_local_description(&mut self, desc: SignalPayload) -> Result<(), TransportError> {
        let token = description_token(&desc)?;
        match description_kind(&desc) {
            Some("offer") => {
                self.emit(TransportEvent::LocalCandidate(
                    serde_json::json!({ "candidate": format!("memory:{token}") }),
                ))
                .await;
                Ok(())
            }
            Some("answer") => self.connect(&token).await,
            other => Err(TransportError::Negotiation(format!(
                "unexpected description type {other:?}"
            ))),
        }
    }

    async fn set_remote_description(
        &mut self,
        desc: SignalPayload,
    ) -> Result<(), TransportError> {
        let token = description_token(&desc)?;
        match description_kind(&desc) {
            Some("offer") => {
                if !self.network.lock().contains_key(&token) {
                    return Err(TransportError::Negotiation(format!("unknown offer {token}")));
                }
                self.remote = Some(token);
                Ok(())
            }
            Some("answer") => {
                if self.offered.as_deref() != Some(token.as_str()) {
                    return Err(TransportError::Negotiation("answer for another offer".into()));
                }
                let channel = self
                    .network
                    .lock()
                    .get_mut(&token)
                    .and_then(|slot| slot.offerer_channel.take())
                    .ok_or_else(|| TransportError::Negotiation("peer has not answered".into()))?;
                self.channel = Some(channel.clone());
                self.emit(TransportEvent::ChannelOpen(channel)).await;
                Ok(())
            }
            other => Err(TransportError::Negotiation(format!(
                "unexpected description type {other:?}"
            ))),
        }
    }

    async fn add_remote_candidate(
        &mut self,
        candidate: SignalPayload,
    ) -> Result<(), TransportError> {
        trace!(?candidate, "Memory transport ignores candidates");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(token) = self.offered.take() {
            self.network.lock().remove(&token);
        }
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
    }
}
