//! Public handle for the relay connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use peerdrop_common::{SessionError, SignalMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::connection::connection_loop;
use super::types::{RelayClientConfig, RelayCommand, RelayEvent};

/// Outbound messages buffered ahead of the socket. Sized for a burst of
/// candidates during negotiation.
const COMMAND_QUEUE: usize = 256;

/// Handle to the background relay connection.
///
/// Sending never waits for the network: a message is either queued for the
/// live connection or rejected on the spot.
pub struct RelayClient {
    command_tx: mpsc::Sender<RelayCommand>,
    connected: Arc<AtomicBool>,
}

impl RelayClient {
    /// Start the background connection. Returns `(client, event_receiver)`.
    pub fn connect(config: RelayClientConfig) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let connected = Arc::new(AtomicBool::new(false));

        let client = Self {
            command_tx,
            connected: Arc::clone(&connected),
        };

        tokio::spawn(connection_loop(config, connected, event_tx, command_rx));

        (client, event_rx)
    }

    /// A client whose connection is driven by the caller, for tests.
    #[cfg(test)]
    fn detached(connected: bool) -> (Self, mpsc::Receiver<RelayCommand>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let client = Self {
            command_tx,
            connected: Arc::new(AtomicBool::new(connected)),
        };
        (client, command_rx)
    }

    /// Queue `msg` for the relay.
    pub fn send(&self, msg: SignalMessage) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::RelayUnavailable);
        }
        self.command_tx
            .try_send(RelayCommand::Send(msg))
            .map_err(|e| match e {
                TrySendError::Full(_) => SessionError::RelayBusy,
                TrySendError::Closed(_) => SessionError::RelayUnavailable,
            })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(RelayCommand::Disconnect).await;
    }
}
