//! The single task that owns a client's session.
//!
//! Everything that can happen to a session (user commands, relay messages,
//! negotiation outcomes, transport events, sender progress, the active timer)
//! is received here and handled one event at a time. The coordinator
//! decides; this loop performs the resulting effects. Nothing here awaits a
//! transport call: those run on the negotiation worker.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::file::describe_file;
use super::negotiator::{NegotiationOutcome, Negotiator};
use super::types::{ClientCommand, ClientConfig};
use crate::pairing::{Effect, PairingCoordinator, PairingState, SessionEvent, TimeoutKind};
use crate::relay::{RelayClient, RelayEvent};
use crate::transfer::{run_sender, SendUpdate};
use crate::transport::{ChannelHandle, TransportEvent, TransportFactory};

/// One unit of work pulled out of `select!`.
enum Step {
    Command(Option<ClientCommand>),
    Relay(Option<RelayEvent>),
    Negotiated(Option<NegotiationOutcome>),
    Transport(Option<TransportEvent>),
    Send(Option<SendUpdate>),
    Timeout(TimeoutKind),
}

pub(crate) struct Runtime {
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    coordinator: PairingCoordinator,
    relay: RelayClient,
    event_tx: mpsc::Sender<SessionEvent>,
    /// Per-session resources, all released by `teardown`.
    negotiator: Option<Negotiator>,
    negotiation_rx: Option<mpsc::Receiver<NegotiationOutcome>>,
    transport_rx: Option<mpsc::Receiver<TransportEvent>>,
    channel: Option<ChannelHandle>,
    sender_task: Option<JoinHandle<()>>,
    send_rx: Option<mpsc::Receiver<SendUpdate>>,
    source: Option<PathBuf>,
    deadline: Option<(Instant, TimeoutKind)>,
}

impl Runtime {
    pub(crate) fn new(
        config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
        relay: RelayClient,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            factory,
            coordinator: PairingCoordinator::new(),
            relay,
            event_tx,
            negotiator: None,
            negotiation_rx: None,
            transport_rx: None,
            channel: None,
            sender_task: None,
            send_rx: None,
            source: None,
            deadline: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ClientCommand>,
        mut relay_rx: mpsc::Receiver<RelayEvent>,
    ) {
        loop {
            let deadline = self.deadline;
            // Channel traffic is handled ahead of relay traffic so that a
            // finished send is recorded before a close that raced it.
            let step = tokio::select! {
                biased;
                cmd = command_rx.recv() => Step::Command(cmd),
                update = recv_opt(&mut self.send_rx) => Step::Send(update),
                outcome = recv_opt(&mut self.negotiation_rx) => Step::Negotiated(outcome),
                event = recv_opt(&mut self.transport_rx) => Step::Transport(event),
                event = relay_rx.recv() => Step::Relay(event),
                kind = expire(deadline) => Step::Timeout(kind),
            };

            match step {
                Step::Command(None) | Step::Command(Some(ClientCommand::Shutdown)) => {
                    self.shutdown().await;
                    return;
                }
                Step::Command(Some(cmd)) => self.handle_command(cmd).await,
                Step::Relay(Some(event)) => self.handle_relay(event).await,
                Step::Relay(None) => {
                    warn!("Relay client stopped unexpectedly");
                    self.shutdown().await;
                    return;
                }
                Step::Negotiated(Some(outcome)) => self.handle_negotiated(outcome).await,
                Step::Negotiated(None) => self.negotiation_rx = None,
                Step::Transport(Some(event)) => self.handle_transport(event).await,
                Step::Transport(None) => self.transport_rx = None,
                Step::Send(Some(update)) => self.handle_send_update(update).await,
                Step::Send(None) => self.send_rx = None,
                Step::Timeout(kind) => {
                    self.deadline = None;
                    let effects = self.coordinator.on_timeout(kind);
                    self.apply(effects).await;
                }
            }

            self.refresh_deadline();
        }
    }

    // -- inputs -------------------------------------------------------------

    async fn handle_command(&mut self, cmd: ClientCommand) {
        debug!(?cmd, "Client command");
        let result = match cmd {
            ClientCommand::SendFile(path) => {
                match describe_file(&path, self.config.verify_digest).await {
                    Ok(metadata) => match self.coordinator.create(metadata) {
                        Ok(effects) => {
                            self.apply(effects).await;
                            // Set after the effects: replacing an old session clears the source.
                            self.source = Some(path);
                            return;
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => {
                        let warning = format!("cannot read {}: {e}", path.display());
                        self.emit(SessionEvent::Warning(warning)).await;
                        return;
                    }
                }
            }
            ClientCommand::Join(code) => self.coordinator.join(&code),
            ClientCommand::Accept => self.coordinator.accept(),
            ClientCommand::Decline => self.coordinator.decline(),
            ClientCommand::Close => Ok(self.coordinator.close()),
            ClientCommand::Shutdown => Ok(Vec::new()),
        };

        match result {
            Ok(effects) => self.apply(effects).await,
            Err(e) => {
                warn!(error = %e, "Command rejected");
                self.emit(SessionEvent::Warning(e.to_string())).await;
            }
        }
    }

    async fn handle_relay(&mut self, event: RelayEvent) {
        let effects = match event {
            RelayEvent::Connected => self.coordinator.on_relay_connected(),
            RelayEvent::Disconnected => self.coordinator.on_relay_disconnected(),
            RelayEvent::Message(msg) => {
                debug!(kind = ?msg.kind, code = %msg.code, "Relay message");
                self.coordinator.on_relay_message(msg)
            }
            RelayEvent::Error(e) => {
                debug!(error = %e, "Relay connection attempt failed");
                Vec::new()
            }
        };
        self.apply(effects).await;
    }

    async fn handle_negotiated(&mut self, outcome: NegotiationOutcome) {
        let effects = match outcome {
            Ok(Some(desc)) => self.coordinator.on_local_description(desc),
            Ok(None) => Vec::new(),
            Err(e) => self.coordinator.on_negotiation_failed(e.to_string()),
        };
        self.apply(effects).await;
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        let effects = match event {
            TransportEvent::LocalCandidate(candidate) => {
                self.coordinator.on_local_candidate(candidate)
            }
            TransportEvent::ChannelOpen(channel) => {
                if self.coordinator.state() != PairingState::Connecting || self.channel.is_some() {
                    debug!("Closing unexpected data channel");
                    channel.close().await;
                    return;
                }
                self.channel = Some(channel);
                self.coordinator.on_channel_open()
            }
            TransportEvent::ChannelMessage(bytes) => {
                let effects = self.coordinator.on_channel_message(&bytes);
                self.touch_stall_timer();
                effects
            }
            TransportEvent::ChannelClosed => self.coordinator.on_channel_closed(None),
            TransportEvent::ChannelError(e) => {
                warn!(error = %e, "Data channel error");
                self.coordinator.on_channel_closed(Some(e))
            }
        };
        self.apply(effects).await;
    }

    async fn handle_send_update(&mut self, update: SendUpdate) {
        let effects = match update {
            SendUpdate::Progress(bytes) => {
                self.touch_stall_timer();
                self.coordinator.on_send_progress(bytes)
            }
            SendUpdate::Finished(_) => {
                self.sender_task = None;
                self.coordinator.on_send_complete()
            }
            SendUpdate::Failed(e) => {
                self.sender_task = None;
                self.coordinator.on_transfer_failed(e)
            }
        };
        self.apply(effects).await;
    }

    // -- effects ------------------------------------------------------------

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Relay(msg) => {
                    if let Err(e) = self.relay.send(msg) {
                        warn!(error = %e, "Relay send rejected");
                        self.emit(SessionEvent::Warning(e.to_string())).await;
                    }
                }
                Effect::Negotiate(step) => self.negotiator().submit(step),
                Effect::StartSending => {
                    if let Err(e) = self.start_sending().await {
                        queue.extend(self.coordinator.on_transfer_failed(e));
                    }
                }
                Effect::Teardown => self.teardown().await,
                Effect::Emit(event) => self.emit(event).await,
            }
        }
    }

    /// The session's negotiation worker, started with a fresh transport on first use.
    fn negotiator(&mut self) -> &Negotiator {
        let factory = &self.factory;
        let transport_rx = &mut self.transport_rx;
        let negotiation_rx = &mut self.negotiation_rx;
        self.negotiator.get_or_insert_with(|| {
            let (tx, rx) = mpsc::channel(256);
            *transport_rx = Some(rx);
            let (negotiator, outcomes) = Negotiator::spawn(factory.create(tx));
            *negotiation_rx = Some(outcomes);
            negotiator
        })
    }

    async fn start_sending(&mut self) -> Result<(), String> {
        let channel = self.channel.clone().ok_or("no data channel")?;
        let path = self.source.clone().ok_or("no file to send")?;
        let metadata = self
            .coordinator
            .session()
            .and_then(|s| s.metadata.clone())
            .ok_or("no file metadata")?;

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| format!("cannot open {}: {e}", path.display()))?;

        info!(file = %metadata.name, size = metadata.size, "Sending file");
        let (tx, rx) = mpsc::channel(64);
        self.send_rx = Some(rx);
        self.sender_task = Some(tokio::spawn(run_sender(
            channel,
            metadata,
            tokio::io::BufReader::new(file),
            self.config.chunk_size,
            tx,
        )));
        Ok(())
    }

    /// Release every per-session resource. Safe to call repeatedly.
    async fn teardown(&mut self) {
        if let Some(task) = self.sender_task.take() {
            task.abort();
        }
        self.send_rx = None;
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        // Dropping the worker handle abandons any pending call and closes the transport.
        self.negotiator = None;
        self.negotiation_rx = None;
        self.transport_rx = None;
        self.source = None;
        self.deadline = None;
    }

    async fn shutdown(&mut self) {
        let effects = self.coordinator.close();
        self.apply(effects).await;
        self.teardown().await;
        self.relay.disconnect().await;
        info!("Client stopped");
    }

    async fn emit(&mut self, event: SessionEvent) {
        let _ = self.event_tx.send(event).await;
    }

    // -- timers -------------------------------------------------------------

    fn timeout_for(&self, kind: TimeoutKind) -> Option<Duration> {
        match kind {
            TimeoutKind::Negotiation => self.config.negotiation_timeout,
            TimeoutKind::Stall => self.config.stall_timeout,
        }
    }

    /// Arm, keep, or clear the timer to match the current state.
    fn refresh_deadline(&mut self) {
        match self.coordinator.pending_timeout() {
            None => self.deadline = None,
            Some(kind) if self.deadline.map(|(_, k)| k) == Some(kind) => {}
            Some(kind) => {
                self.deadline = self
                    .timeout_for(kind)
                    .map(|after| (Instant::now() + after, kind));
            }
        }
    }

    fn touch_stall_timer(&mut self) {
        if let Some((_, TimeoutKind::Stall)) = self.deadline {
            self.deadline = self
                .config
                .stall_timeout
                .map(|after| (Instant::now() + after, TimeoutKind::Stall));
        }
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<(Instant, TimeoutKind)>) -> TimeoutKind {
    match deadline {
        Some((at, kind)) => {
            tokio::time::sleep_until(at).await;
            kind
        }
        None => std::future::pending().await,
    }
}
