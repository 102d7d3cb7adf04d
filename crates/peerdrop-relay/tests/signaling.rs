//! Signaling flows against a live relay over real WebSockets.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use peerdrop_common::{FileMetadata, SignalKind, SignalMessage};
use peerdrop_relay::{serve, SessionStore};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, SessionStore::new()));
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, msg: &SignalMessage) {
    ws.send(Message::Text(msg.to_json().unwrap().into()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Client) -> SignalMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for relay")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn sender_and_receiver_pair_and_exchange_signals() {
    let addr = start_relay().await;
    let mut sender = connect(addr).await;
    let mut receiver = connect(addr).await;
    let meta = FileMetadata::new("holiday.jpg", 40_000, "image/jpeg");

    send(&mut sender, &SignalMessage::create(&meta)).await;
    let created = recv(&mut sender).await;
    assert_eq!(created.kind, SignalKind::Created);
    let code = created.effective_code().unwrap();
    assert_eq!(code.len(), 6);

    send(&mut receiver, &SignalMessage::join(&code)).await;
    let joined = recv(&mut receiver).await;
    assert_eq!(joined.kind, SignalKind::Joined);
    assert_eq!(joined.metadata().unwrap(), meta);
    assert_eq!(recv(&mut sender).await.kind, SignalKind::ReceiverJoined);

    send(&mut receiver, &SignalMessage::accept(&code)).await;
    assert_eq!(recv(&mut sender).await.kind, SignalKind::Accept);

    let offer = SignalMessage::new(
        SignalKind::Offer,
        code.as_str(),
        serde_json::json!({"type": "offer", "sdp": "v=0"}),
    );
    send(&mut sender, &offer).await;
    let got = recv(&mut receiver).await;
    assert_eq!(got.kind, SignalKind::Offer);
    assert_eq!(got.payload, offer.payload);

    let candidate = SignalMessage::new(
        SignalKind::IceCandidate,
        code.as_str(),
        serde_json::json!({"candidate": "127.0.0.1:9"}),
    );
    send(&mut receiver, &candidate).await;
    assert_eq!(recv(&mut sender).await.payload, candidate.payload);
}

#[tokio::test]
async fn wrong_code_is_reported() {
    let addr = start_relay().await;
    let mut receiver = connect(addr).await;

    send(&mut receiver, &SignalMessage::join("000000")).await;
    let reply = recv(&mut receiver).await;
    assert_eq!(reply.kind, SignalKind::Error);
    assert_eq!(reply.error_text().as_deref(), Some("session not found"));
}

#[tokio::test]
async fn second_receiver_is_turned_away() {
    let addr = start_relay().await;
    let mut sender = connect(addr).await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    send(&mut sender, &SignalMessage::create(&FileMetadata::new("a", 1, ""))).await;
    let code = recv(&mut sender).await.code;

    send(&mut first, &SignalMessage::join(&code)).await;
    assert_eq!(recv(&mut first).await.kind, SignalKind::Joined);

    send(&mut second, &SignalMessage::join(&code)).await;
    assert_eq!(
        recv(&mut second).await.error_text().as_deref(),
        Some("session already has a receiver")
    );
}

#[tokio::test]
async fn disconnect_notifies_peer() {
    let addr = start_relay().await;
    let mut sender = connect(addr).await;
    let mut receiver = connect(addr).await;

    send(&mut sender, &SignalMessage::create(&FileMetadata::new("b", 2, ""))).await;
    let code = recv(&mut sender).await.code;
    send(&mut receiver, &SignalMessage::join(&code)).await;
    recv(&mut receiver).await;
    recv(&mut sender).await;

    receiver.close(None).await.unwrap();

    let notice = recv(&mut sender).await;
    assert_eq!(notice.kind, SignalKind::Close);
    assert_eq!(notice.code, code);
    assert_eq!(notice.error_text().as_deref(), Some("Peer disconnected"));
}

#[tokio::test]
async fn explicit_close_reaches_peer() {
    let addr = start_relay().await;
    let mut sender = connect(addr).await;
    let mut receiver = connect(addr).await;

    send(&mut sender, &SignalMessage::create(&FileMetadata::new("c", 3, ""))).await;
    let code = recv(&mut sender).await.code;
    send(&mut receiver, &SignalMessage::join(&code)).await;
    recv(&mut receiver).await;
    recv(&mut sender).await;

    send(&mut receiver, &SignalMessage::close(&code)).await;
    let notice = recv(&mut sender).await;
    assert_eq!(notice.kind, SignalKind::Close);
    assert!(notice.error_text().is_none());
}
