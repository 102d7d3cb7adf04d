//! Per-connection handler: parse each relay message, route it, and clean
//! up the connection's sessions when it goes away.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use peerdrop_common::{SignalKind, SignalMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::session::{next_conn_id, ConnId, Peer, SessionStore};

/// Handle a single WebSocket connection.
pub async fn handle_connection<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    addr: SocketAddr,
    store: SessionStore,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let conn = next_conn_id();
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(256);

    info!(peer = %addr, conn, "Client connected");

    loop {
        tokio::select! {
            // Messages queued by other connections → this client's WebSocket
            Some(msg) = rx.recv() => {
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let replies = route_message(&store, conn, &tx, &text).await;
                        for reply in replies {
                            let Ok(json) = reply.to_json() else { continue };
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(peer = %addr, conn, "Client disconnected");

    for (code, peer) in store.remove_connection(conn).await {
        info!(code = %code, "Session removed due to disconnect");
        if let Some(peer) = peer {
            forward(&peer, &SignalMessage::close_with_error(&code, "Peer disconnected")).await;
        }
    }
}

/// Route one text frame. Returns replies addressed to the originating client;
/// messages for the other party are queued on its channel directly.
pub(crate) async fn route_message(
    store: &SessionStore,
    conn: ConnId,
    tx: &mpsc::Sender<String>,
    text: &str,
) -> Vec<SignalMessage> {
    let msg: SignalMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(conn, error = %e, "Failed to parse message");
            return vec![SignalMessage::error("", "Invalid message format")];
        }
    };

    match msg.kind {
        SignalKind::Create => handle_create(store, conn, tx, &msg).await,
        SignalKind::Join => handle_join(store, conn, tx, &msg).await,
        SignalKind::Accept => handle_accept(store, &msg).await,
        SignalKind::Offer | SignalKind::Answer | SignalKind::IceCandidate => {
            handle_relay(store, conn, &msg).await
        }
        SignalKind::Close => {
            handle_close(store, conn, &msg).await;
            Vec::new()
        }
        other => {
            warn!(conn, kind = ?other, "Unknown message type");
            vec![SignalMessage::error(&msg.code, "Unknown message type")]
        }
    }
}

async fn handle_create(
    store: &SessionStore,
    conn: ConnId,
    tx: &mpsc::Sender<String>,
    msg: &SignalMessage,
) -> Vec<SignalMessage> {
    let metadata = match msg.metadata() {
        Ok(metadata) => metadata,
        Err(_) => return vec![SignalMessage::error("", "Invalid file metadata")],
    };

    let name = metadata.name.clone();
    let sender = Peer {
        conn,
        tx: tx.clone(),
    };
    match store.create_session(sender, metadata).await {
        Ok(code) => {
            info!(code = %code, file = %name, "Session created");
            vec![SignalMessage::created(&code)]
        }
        Err(e) => {
            warn!(conn, error = e, "Failed to create session");
            vec![SignalMessage::error("", "Failed to create session")]
        }
    }
}

async fn handle_join(
    store: &SessionStore,
    conn: ConnId,
    tx: &mpsc::Sender<String>,
    msg: &SignalMessage,
) -> Vec<SignalMessage> {
    let code = msg.code.trim();
    if code.is_empty() {
        return vec![SignalMessage::error("", "Code is required")];
    }

    let receiver = Peer {
        conn,
        tx: tx.clone(),
    };
    match store.join_session(code, receiver).await {
        Ok((metadata, sender_tx)) => {
            info!(code = %code, "Receiver joined session");
            forward(&sender_tx, &SignalMessage::receiver_joined(code)).await;
            vec![SignalMessage::joined(code, &metadata)]
        }
        Err(e) => vec![SignalMessage::error(code, e)],
    }
}

/// Receiver's acceptance goes to the sender, who then starts negotiation.
async fn handle_accept(store: &SessionStore, msg: &SignalMessage) -> Vec<SignalMessage> {
    match store.get_sender_tx(&msg.code).await {
        Some(sender_tx) => {
            forward(&sender_tx, msg).await;
            Vec::new()
        }
        None => vec![SignalMessage::error(&msg.code, "Session not found")],
    }
}

/// Offers, answers and candidates pass through to the other party untouched.
async fn handle_relay(store: &SessionStore, conn: ConnId, msg: &SignalMessage) -> Vec<SignalMessage> {
    match store.get_peer_tx(&msg.code, conn).await {
        Ok(Some(peer)) => {
            forward(&peer, msg).await;
            Vec::new()
        }
        Ok(None) => vec![SignalMessage::error(&msg.code, "Peer not connected")],
        Err(e) => vec![SignalMessage::error(&msg.code, e)],
    }
}

async fn handle_close(store: &SessionStore, conn: ConnId, msg: &SignalMessage) {
    let Some(peer) = store.close_session(&msg.code, conn).await else {
        return;
    };
    if let Some(peer) = peer {
        forward(&peer, &SignalMessage::close(&msg.code)).await;
    }
    info!(code = %msg.code, "Session closed");
}

async fn forward(tx: &mpsc::Sender<String>, msg: &SignalMessage) {
    match msg.to_json() {
        Ok(json) => {
            if tx.send(json).await.is_err() {
                debug!(code = %msg.code, "Peer channel closed");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdrop_common::FileMetadata;

    async fn route(
        store: &SessionStore,
        conn: ConnId,
        tx: &mpsc::Sender<String>,
        msg: &SignalMessage,
    ) -> Vec<SignalMessage> {
        route_message(store, conn, tx, &msg.to_json().unwrap()).await
    }

    fn next(rx: &mut mpsc::Receiver<String>) -> SignalMessage {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn garbage_is_invalid_format() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(8);
        let replies = route_message(&store, next_conn_id(), &tx, "{not json").await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].error_text().as_deref(), Some("Invalid message format"));
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(8);
        let replies =
            route_message(&store, next_conn_id(), &tx, r#"{"type":"warp","code":"1"}"#).await;
        assert_eq!(replies[0].error_text().as_deref(), Some("Unknown message type"));
    }

    #[tokio::test]
    async fn create_with_bad_metadata_fails() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(8);
        let msg = SignalMessage::new(SignalKind::Create, "", serde_json::json!({"size": "big"}));
        let replies = route(&store, next_conn_id(), &tx, &msg).await;
        assert_eq!(replies[0].error_text().as_deref(), Some("Invalid file metadata"));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn full_pairing_exchange() {
        let store = SessionStore::new();
        let (sender_tx, mut sender_rx) = mpsc::channel(8);
        let (receiver_tx, mut receiver_rx) = mpsc::channel(8);
        let sender = next_conn_id();
        let receiver = next_conn_id();
        let meta = FileMetadata::new("notes.txt", 40_000, "text/plain");

        let replies = route(&store, sender, &sender_tx, &SignalMessage::create(&meta)).await;
        assert_eq!(replies[0].kind, SignalKind::Created);
        let code = replies[0].code.clone();

        // Offer before anyone joined.
        let offer = SignalMessage::new(SignalKind::Offer, &code, serde_json::json!({"sdp": "x"}));
        let replies = route(&store, sender, &sender_tx, &offer).await;
        assert_eq!(replies[0].error_text().as_deref(), Some("Peer not connected"));

        let replies = route(&store, receiver, &receiver_tx, &SignalMessage::join(&code)).await;
        assert_eq!(replies[0].kind, SignalKind::Joined);
        assert_eq!(replies[0].metadata().unwrap(), meta);
        assert_eq!(next(&mut sender_rx).kind, SignalKind::ReceiverJoined);

        route(&store, receiver, &receiver_tx, &SignalMessage::accept(&code)).await;
        assert_eq!(next(&mut sender_rx).kind, SignalKind::Accept);

        assert!(route(&store, sender, &sender_tx, &offer).await.is_empty());
        let forwarded = next(&mut receiver_rx);
        assert_eq!(forwarded.kind, SignalKind::Offer);
        assert_eq!(forwarded.payload, serde_json::json!({"sdp": "x"}));

        route(&store, receiver, &receiver_tx, &SignalMessage::close(&code)).await;
        assert_eq!(next(&mut sender_rx).kind, SignalKind::Close);
        assert!(!store.exists(&code).await);
    }

    #[tokio::test]
    async fn join_requires_code() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(8);
        let replies = route(&store, next_conn_id(), &tx, &SignalMessage::join("")).await;
        assert_eq!(replies[0].error_text().as_deref(), Some("Code is required"));
    }

    #[tokio::test]
    async fn relay_to_unknown_session_fails() {
        let store = SessionStore::new();
        let (tx, _rx) = mpsc::channel(8);
        let msg = SignalMessage::new(SignalKind::Answer, "123456", serde_json::json!({}));
        let replies = route(&store, next_conn_id(), &tx, &msg).await;
        assert_eq!(replies[0].error_text().as_deref(), Some("Session not found"));
    }
}
