//! Negotiation steps run against the session's transport on a worker task.
//!
//! The runtime never awaits a transport call itself: it queues a step and
//! later receives the outcome on a channel it selects on. Dropping the
//! [`Negotiator`] abandons any call in flight and closes the transport.

use peerdrop_common::{SignalPayload, TransportError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::pairing::NegotiationStep;
use crate::transport::PeerTransport;

/// Result of one step: the local description to relay, if the step made one.
pub(crate) type NegotiationOutcome = Result<Option<SignalPayload>, TransportError>;

/// Handle to the worker that owns a session's transport.
pub(crate) struct Negotiator {
    steps: mpsc::UnboundedSender<NegotiationStep>,
    _cancel: oneshot::Sender<()>,
}

impl Negotiator {
    /// Move `transport` onto a worker. Outcomes arrive in step order on the
    /// returned receiver.
    pub(crate) fn spawn(
        transport: Box<dyn PeerTransport>,
    ) -> (Self, mpsc::Receiver<NegotiationOutcome>) {
        let (steps_tx, steps_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(run(transport, steps_rx, outcome_tx, cancel_rx));

        let negotiator = Self {
            steps: steps_tx,
            _cancel: cancel_tx,
        };
        (negotiator, outcome_rx)
    }

    /// Queue a step. Never waits.
    pub(crate) fn submit(&self, step: NegotiationStep) {
        if self.steps.send(step).is_err() {
            debug!("Negotiation worker already stopped");
        }
    }
}

async fn run(
    mut transport: Box<dyn PeerTransport>,
    mut steps: mpsc::UnboundedReceiver<NegotiationStep>,
    outcomes: mpsc::Sender<NegotiationOutcome>,
    mut cancel: oneshot::Receiver<()>,
) {
    loop {
        let step = tokio::select! {
            biased;
            _ = &mut cancel => break,
            step = steps.recv() => match step {
                Some(step) => step,
                None => break,
            },
        };

        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => break,
            outcome = perform(transport.as_mut(), step) => outcome,
        };

        let failed = outcome.is_err();
        if outcomes.send(outcome).await.is_err() || failed {
            break;
        }
    }

    transport.close().await;
    debug!("Transport closed");
}

async fn perform(transport: &mut dyn PeerTransport, step: NegotiationStep) -> NegotiationOutcome {
    match step {
        NegotiationStep::CreateOffer => {
            let offer = transport.create_offer().await?;
            transport.set_local_description(offer.clone()).await?;
            Ok(Some(offer))
        }
        NegotiationStep::AnswerOffer(offer) => {
            transport.set_remote_description(offer).await?;
            let answer = transport.create_answer().await?;
            transport.set_local_description(answer.clone()).await?;
            Ok(Some(answer))
        }
        NegotiationStep::ApplyAnswer(answer) => {
            transport.set_remote_description(answer).await?;
            Ok(None)
        }
        NegotiationStep::AddCandidate(candidate) => {
            transport.add_remote_candidate(candidate).await?;
            Ok(None)
        }
    }
}
