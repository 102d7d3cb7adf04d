//! Session store: maps 6-digit codes to a sender connection and, once
//! joined, a receiver connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use peerdrop_common::{FileMetadata, SessionCode, SignalMessage};
use tokio::sync::{mpsc, RwLock};

/// Attempts at finding an unused code before `create` gives up.
const MAX_CODE_ATTEMPTS: usize = 10;

/// Identifies one WebSocket connection for the lifetime of the process.
pub type ConnId = u64;

static CONN_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_conn_id() -> ConnId {
    CONN_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// One side of a session: its connection id and outbound queue.
#[derive(Debug, Clone)]
pub struct Peer {
    pub conn: ConnId,
    pub tx: mpsc::Sender<String>,
}

/// A session pairs exactly one sender and at most one receiver.
pub struct Session {
    pub sender: Peer,
    pub receiver: Option<Peer>,
    pub metadata: FileMetadata,
    pub created_at: Instant,
}

impl Session {
    /// The party opposite `conn`, if `conn` belongs to this session.
    fn other_side(&self, conn: ConnId) -> Option<Option<&Peer>> {
        if self.sender.conn == conn {
            Some(self.receiver.as_ref())
        } else if self.receiver.as_ref().is_some_and(|r| r.conn == conn) {
            Some(Some(&self.sender))
        } else {
            None
        }
    }
}

/// Thread-safe session store.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for `sender` and return its code.
    pub async fn create_session(
        &self,
        sender: Peer,
        metadata: FileMetadata,
    ) -> Result<String, &'static str> {
        let mut map = self.sessions.write().await;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = SessionCode::generate().to_string();
            if map.contains_key(&code) {
                continue;
            }
            map.insert(
                code.clone(),
                Session {
                    sender,
                    receiver: None,
                    metadata,
                    created_at: Instant::now(),
                },
            );
            return Ok(code);
        }
        Err("failed to allocate a unique code")
    }

    /// Attach `receiver` to an existing session. Returns the file metadata
    /// and the sender's queue so the caller can notify it.
    pub async fn join_session(
        &self,
        code: &str,
        receiver: Peer,
    ) -> Result<(FileMetadata, mpsc::Sender<String>), &'static str> {
        let mut map = self.sessions.write().await;
        let session = map.get_mut(code).ok_or("session not found")?;
        if session.receiver.is_some() {
            return Err("session already has a receiver");
        }
        session.receiver = Some(receiver);
        Ok((session.metadata.clone(), session.sender.tx.clone()))
    }

    pub async fn get_sender_tx(&self, code: &str) -> Option<mpsc::Sender<String>> {
        let map = self.sessions.read().await;
        map.get(code).map(|s| s.sender.tx.clone())
    }

    /// The queue of the party opposite `conn`. `Err` if the session does not
    /// exist, `Ok(None)` if the other side has not joined yet.
    pub async fn get_peer_tx(
        &self,
        code: &str,
        conn: ConnId,
    ) -> Result<Option<mpsc::Sender<String>>, &'static str> {
        let map = self.sessions.read().await;
        let session = map.get(code).ok_or("Session not found")?;
        match session.other_side(conn) {
            Some(peer) => Ok(peer.map(|p| p.tx.clone())),
            // Connections outside the session are routed to the sender.
            None => Ok(Some(session.sender.tx.clone())),
        }
    }

    /// Remove a session on behalf of one of its participants. Returns the
    /// other party's queue, or `None` if nothing was removed.
    pub async fn close_session(
        &self,
        code: &str,
        conn: ConnId,
    ) -> Option<Option<mpsc::Sender<String>>> {
        let mut map = self.sessions.write().await;
        let peer = map
            .get(code)?
            .other_side(conn)?
            .map(|p| p.tx.clone());
        map.remove(code);
        Some(peer)
    }

    /// Drop every session `conn` participates in. Returns `(code, other side)`
    /// for each removed session.
    pub async fn remove_connection(&self, conn: ConnId) -> Vec<(String, Option<mpsc::Sender<String>>)> {
        let mut map = self.sessions.write().await;
        let mut removed = Vec::new();
        map.retain(|code, session| match session.other_side(conn) {
            Some(peer) => {
                removed.push((code.clone(), peer.map(|p| p.tx.clone())));
                false
            }
            None => true,
        });
        removed
    }

    /// Reap sessions older than `max_age` that never got a receiver. The
    /// waiting sender is told the session expired.
    pub async fn reap_stale(&self, max_age: Duration) -> usize {
        let mut expired = Vec::new();
        {
            let mut map = self.sessions.write().await;
            let now = Instant::now();
            map.retain(|code, session| {
                let stale =
                    session.receiver.is_none() && now.duration_since(session.created_at) > max_age;
                if stale {
                    tracing::info!(code = %code, "Reaping stale session");
                    expired.push((code.clone(), session.sender.tx.clone()));
                }
                !stale
            });
        }

        let count = expired.len();
        for (code, tx) in expired {
            if let Ok(json) = SignalMessage::close_with_error(&code, "Session expired").to_json() {
                let _ = tx.send(json).await;
            }
        }
        count
    }

    pub async fn exists(&self, code: &str) -> bool {
        self.sessions.read().await.contains_key(code)
    }

    /// Number of active sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
