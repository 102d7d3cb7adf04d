//! Client runtime: a relay connection, a pairing coordinator, and the
//! session's transport, driven from one task.

mod file;
mod negotiator;
mod runtime;
mod types;

pub use file::{describe_file, guess_mime_type};
pub use types::ClientConfig;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::pairing::SessionEvent;
use crate::relay::RelayClient;
use crate::transport::TransportFactory;
use runtime::Runtime;
use types::ClientCommand;

/// Handle to a running client.
///
/// Commands are queued to the runtime task; their outcome arrives as
/// [`SessionEvent`]s on the receiver returned by [`PeerdropClient::start`].
pub struct PeerdropClient {
    command_tx: mpsc::Sender<ClientCommand>,
    task: JoinHandle<()>,
}

impl PeerdropClient {
    /// Connect to the relay and start the runtime.
    /// Returns `(client, event_receiver)`.
    pub fn start<F>(config: ClientConfig, factory: F) -> (Self, mpsc::Receiver<SessionEvent>)
    where
        F: TransportFactory,
    {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (relay, relay_rx) = RelayClient::connect(config.relay.clone());

        let runtime = Runtime::new(config, Arc::new(factory), relay, event_tx);
        let task = tokio::spawn(runtime.run(command_rx, relay_rx));

        (Self { command_tx, task }, event_rx)
    }

    /// Offer the file at `path` under a new session.
    pub async fn send_file(&self, path: impl Into<PathBuf>) {
        self.command(ClientCommand::SendFile(path.into())).await;
    }

    /// Join the session with the given code.
    pub async fn join(&self, code: impl Into<String>) {
        self.command(ClientCommand::Join(code.into())).await;
    }

    pub async fn accept(&self) {
        self.command(ClientCommand::Accept).await;
    }

    pub async fn decline(&self) {
        self.command(ClientCommand::Decline).await;
    }

    /// Close the current session, if any.
    pub async fn close(&self) {
        self.command(ClientCommand::Close).await;
    }

    /// Close any session, disconnect from the relay, and wait for the runtime to exit.
    pub async fn shutdown(self) {
        self.command(ClientCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn command(&self, cmd: ClientCommand) {
        let _ = self.command_tx.send(cmd).await;
    }
}
