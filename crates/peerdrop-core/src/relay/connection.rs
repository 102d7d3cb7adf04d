//! Background WebSocket connection loop with fixed-delay reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use peerdrop_common::SignalMessage;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::types::{RelayClientConfig, RelayCommand, RelayEvent};

/// How a live connection ended.
enum SessionEnd {
    /// Dropped by the network or the relay; reconnect.
    Lost,
    /// Disconnect requested or nobody is listening; stop.
    Shutdown,
}

/// Background task managing the relay connection.
pub(crate) async fn connection_loop(
    config: RelayClientConfig,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::Sender<RelayEvent>,
    mut command_rx: mpsc::Receiver<RelayCommand>,
) {
    loop {
        info!(url = %config.url, "Connecting to relay");

        match tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                connected.store(true, Ordering::SeqCst);
                info!("Connected to relay");
                let end = if event_tx.send(RelayEvent::Connected).await.is_ok() {
                    run_connection(ws_stream, &event_tx, &mut command_rx).await
                } else {
                    SessionEnd::Shutdown
                };

                connected.store(false, Ordering::SeqCst);
                let stop_requested = discard_queued(&mut command_rx);
                let _ = event_tx.send(RelayEvent::Disconnected).await;
                if stop_requested || matches!(end, SessionEnd::Shutdown) {
                    info!("Relay client stopped");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to relay");
                let _ = event_tx
                    .send(RelayEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!(
                    timeout_secs = config.connect_timeout.as_secs(),
                    "Relay connection timed out"
                );
                let _ = event_tx
                    .send(RelayEvent::Error("Connection timed out".to_string()))
                    .await;
            }
        }

        if event_tx.is_closed() {
            return;
        }

        info!(
            delay_secs = config.reconnect_delay.as_secs(),
            "Reconnecting to relay"
        );
        if !wait_for_retry(&config, &mut command_rx).await {
            info!("Relay client stopped");
            return;
        }
    }
}

async fn run_connection<S>(
    ws_stream: S,
    event_tx: &mpsc::Sender<RelayEvent>,
    command_rx: &mut mpsc::Receiver<RelayCommand>,
) -> SessionEnd
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(msg) => {
                            if event_tx.send(RelayEvent::Message(msg)).await.is_err() {
                                let _ = ws_write.close().await;
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => debug!(error = %e, text = %text, "Unrecognized relay frame"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Relay closed connection");
                    return SessionEnd::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Relay WebSocket error");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
            },
            cmd = command_rx.recv() => match cmd {
                Some(RelayCommand::Send(msg)) => {
                    let json = match msg.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode relay message");
                            continue;
                        }
                    };
                    if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
                        warn!(error = %e, "Relay send failed");
                        return SessionEnd::Lost;
                    }
                }
                Some(RelayCommand::Disconnect) | None => {
                    let _ = ws_write.close().await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}

/// Drop whatever was queued for a connection that no longer exists.
/// Returns `true` if a disconnect was among the queued commands or the
/// client handle is gone.
fn discard_queued(command_rx: &mut mpsc::Receiver<RelayCommand>) -> bool {
    let mut dropped = 0usize;
    let stop = loop {
        match command_rx.try_recv() {
            Ok(RelayCommand::Send(msg)) => {
                debug!(kind = ?msg.kind, "Discarding queued relay message");
                dropped += 1;
            }
            Ok(RelayCommand::Disconnect) => break true,
            Err(TryRecvError::Empty) => break false,
            Err(TryRecvError::Disconnected) => break true,
        }
    };
    if dropped > 0 {
        warn!(dropped, "Relay connection lost with messages still queued");
    }
    stop
}

/// Sleep out the reconnect delay. Returns `false` if the client was shut down meanwhile.
async fn wait_for_retry(
    config: &RelayClientConfig,
    command_rx: &mut mpsc::Receiver<RelayCommand>,
) -> bool {
    let sleep = tokio::time::sleep(config.reconnect_delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = command_rx.recv() => match cmd {
                Some(RelayCommand::Send(msg)) => {
                    warn!(kind = ?msg.kind, "Dropping relay message while disconnected");
                }
                Some(RelayCommand::Disconnect) | None => return false,
            },
        }
    }
}
