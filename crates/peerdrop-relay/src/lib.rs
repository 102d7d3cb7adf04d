//! peerdrop-relay: WebSocket signaling relay.
//!
//! Pairs a sender and a receiver under a 6-digit code and forwards their
//! negotiation messages until they have a direct connection. The relay never
//! sees file content.

pub mod connection;
pub mod session;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;

pub use connection::handle_connection;
pub use session::SessionStore;

/// How often the reaper looks for stale sessions.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Accept loop. Runs until the listener fails permanently or the task is aborted.
pub async fn serve(listener: TcpListener, store: SessionStore) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = store.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, store).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Spawn the stale session reaper.
pub fn spawn_reaper(store: SessionStore, ttl: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let reaped = store.reap_stale(ttl).await;
            let count = store.count().await;
            tracing::debug!(sessions = count, reaped, "Reaper tick");
        }
    })
}
