use peerdrop_common::{FileMetadata, SessionError, SignalKind, SignalMessage};
use serde_json::json;

use super::*;
use crate::transfer::frame::{encode_chunk, Frame};
use crate::transfer::state::chunkify;

const CODE: &str = "482913";

fn connected() -> PairingCoordinator {
    let mut coordinator = PairingCoordinator::new();
    coordinator.on_relay_connected();
    coordinator
}

fn meta() -> FileMetadata {
    FileMetadata::new("report.pdf", 40_000, "application/pdf")
}

fn relayed(effects: &[Effect]) -> Vec<SignalMessage> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Relay(msg) => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

fn events(effects: &[Effect]) -> Vec<SessionEvent> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Emit(event) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

fn teardowns(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| **e == Effect::Teardown).count()
}

fn closed_reason(effects: &[Effect]) -> Option<CloseReason> {
    events(effects).into_iter().find_map(|e| match e {
        SessionEvent::Closed(reason) => Some(reason),
        _ => None,
    })
}

fn msg(kind: SignalKind, payload: serde_json::Value) -> SignalMessage {
    SignalMessage::new(kind, CODE, payload)
}

/// Sender that has a code and a joined receiver.
fn sender_with_peer() -> PairingCoordinator {
    let mut c = connected();
    c.create(meta()).unwrap();
    c.on_relay_message(SignalMessage::created(CODE));
    c.on_relay_message(SignalMessage::receiver_joined(CODE));
    c
}

/// Receiver that has been offered `meta()` and accepted.
fn accepted_receiver() -> PairingCoordinator {
    let mut c = connected();
    c.join(CODE).unwrap();
    c.on_relay_message(SignalMessage::joined(CODE, &meta()));
    c.accept().unwrap();
    c
}

fn transferring_receiver() -> PairingCoordinator {
    let mut c = accepted_receiver();
    c.on_relay_message(msg(SignalKind::Offer, json!({"type": "offer", "token": "t"})));
    c.on_channel_open();
    assert_eq!(c.state(), PairingState::Transferring);
    c
}

// ---------------------------------------------------------------------------
// Sender path
// ---------------------------------------------------------------------------

#[test]
fn sender_walks_the_full_path() {
    let mut c = connected();

    let effects = c.create(meta()).unwrap();
    assert_eq!(c.state(), PairingState::Created);
    let sent = relayed(&effects);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, SignalKind::Create);
    assert_eq!(sent[0].metadata().unwrap(), meta());

    let effects = c.on_relay_message(SignalMessage::created(CODE));
    assert!(events(&effects)
        .iter()
        .any(|e| matches!(e, SessionEvent::CodeAssigned(code) if code.as_str() == CODE)));

    let effects = c.on_relay_message(SignalMessage::receiver_joined(CODE));
    assert_eq!(c.state(), PairingState::PeerJoined);
    assert!(events(&effects).contains(&SessionEvent::PeerJoined));

    let effects = c.on_relay_message(SignalMessage::accept(CODE));
    assert_eq!(c.state(), PairingState::Connecting);
    assert!(effects.contains(&Effect::Negotiate(NegotiationStep::CreateOffer)));

    let offer = json!({"type": "offer", "token": "abc"});
    let effects = c.on_local_description(offer.clone());
    let sent = relayed(&effects);
    assert_eq!(sent[0].kind, SignalKind::Offer);
    assert_eq!(sent[0].code, CODE);
    assert_eq!(sent[0].payload, offer);

    let answer = json!({"type": "answer", "token": "abc"});
    let effects = c.on_relay_message(msg(SignalKind::Answer, answer.clone()));
    assert_eq!(
        effects,
        vec![Effect::Negotiate(NegotiationStep::ApplyAnswer(answer))]
    );

    let effects = c.on_channel_open();
    assert_eq!(c.state(), PairingState::Transferring);
    assert!(effects.contains(&Effect::StartSending));

    let mut percents = Vec::new();
    for bytes in [16_384, 32_768, 40_000] {
        for event in events(&c.on_send_progress(bytes)) {
            if let SessionEvent::Progress(p) = event {
                percents.push(p.bytes_transferred);
            }
        }
    }
    assert_eq!(percents, vec![16_384, 32_768, 40_000]);

    let effects = c.on_send_complete();
    assert_eq!(c.state(), PairingState::Complete);
    assert!(events(&effects).contains(&SessionEvent::SendComplete));
    assert_eq!(c.session().unwrap().transfer.progress_percent(), 100.0);
}

#[test]
fn accept_straight_from_created_still_negotiates() {
    let mut c = connected();
    c.create(meta()).unwrap();
    c.on_relay_message(SignalMessage::created(CODE));

    let effects = c.on_relay_message(SignalMessage::accept(CODE));
    assert!(effects.contains(&Effect::Negotiate(NegotiationStep::CreateOffer)));
}

// ---------------------------------------------------------------------------
// Receiver path
// ---------------------------------------------------------------------------

#[test]
fn receiver_walks_the_full_path_with_forty_thousand_bytes() {
    let mut c = connected();

    let effects = c.join(CODE).unwrap();
    assert_eq!(c.state(), PairingState::AwaitingOffer);
    assert_eq!(relayed(&effects)[0].kind, SignalKind::Join);

    let effects = c.on_relay_message(SignalMessage::joined(CODE, &meta()));
    assert_eq!(c.state(), PairingState::Offered);
    assert!(events(&effects).contains(&SessionEvent::Offered(meta())));

    let effects = c.accept().unwrap();
    assert_eq!(c.state(), PairingState::Accepted);
    assert_eq!(relayed(&effects)[0].kind, SignalKind::Accept);

    let offer = json!({"type": "offer", "token": "t"});
    let effects = c.on_relay_message(msg(SignalKind::Offer, offer.clone()));
    assert_eq!(c.state(), PairingState::Connecting);
    assert!(effects.contains(&Effect::Negotiate(NegotiationStep::AnswerOffer(offer))));

    let effects = c.on_local_description(json!({"type": "answer", "token": "t"}));
    assert_eq!(relayed(&effects)[0].kind, SignalKind::Answer);

    let effects = c.on_channel_open();
    assert!(!effects.contains(&Effect::StartSending));

    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    let mut frames = vec![Frame::Metadata(meta()).encode().unwrap()];
    frames.extend(chunkify(&data, 16_384).iter().map(|c| encode_chunk(c)));
    frames.push(Frame::Complete.encode().unwrap());

    let mut seen = Vec::new();
    let mut received = None;
    for frame in &frames {
        for event in events(&c.on_channel_message(frame)) {
            match event {
                SessionEvent::Progress(p) => seen.push(p.bytes_transferred),
                SessionEvent::FileReceived(file) => received = Some(file),
                _ => {}
            }
        }
    }

    assert_eq!(seen, vec![0, 16_384, 32_768, 40_000, 40_000]);
    assert_eq!(c.state(), PairingState::Complete);
    let file = received.expect("file should be delivered");
    assert_eq!(file.data.len(), 40_000);
    assert_eq!(file.data, data);
}

#[test]
fn invalid_code_is_rejected_without_a_session() {
    let mut c = connected();
    assert!(matches!(c.join("12ab"), Err(SessionError::InvalidCode(_))));
    assert!(c.session().is_none());
}

// ---------------------------------------------------------------------------
// Negotiation roles
// ---------------------------------------------------------------------------

#[test]
fn only_the_sender_creates_offers() {
    let mut receiver = accepted_receiver();
    let effects = receiver.on_relay_message(SignalMessage::accept(CODE));
    assert!(effects.is_empty());
    assert_eq!(receiver.state(), PairingState::Accepted);

    let mut sender = sender_with_peer();
    let effects = sender.on_relay_message(msg(SignalKind::Offer, json!({"type": "offer"})));
    assert!(effects.is_empty());
    assert_eq!(sender.state(), PairingState::PeerJoined);
}

#[test]
fn answer_at_receiver_is_ignored() {
    let mut c = accepted_receiver();
    c.on_relay_message(msg(SignalKind::Offer, json!({"type": "offer"})));
    let effects = c.on_relay_message(msg(SignalKind::Answer, json!({"type": "answer"})));
    assert!(effects.is_empty());
}

#[test]
fn candidates_are_applied_immediately() {
    let mut c = sender_with_peer();
    let candidate = json!({"candidate": "10.0.0.2:4000"});
    let effects = c.on_relay_message(msg(SignalKind::IceCandidate, candidate.clone()));
    assert_eq!(
        effects,
        vec![Effect::Negotiate(NegotiationStep::AddCandidate(candidate))]
    );
}

#[test]
fn local_candidates_are_relayed_with_the_code() {
    let mut c = sender_with_peer();
    let effects = c.on_local_candidate(json!({"candidate": "127.0.0.1:5000"}));
    let sent = relayed(&effects);
    assert_eq!(sent[0].kind, SignalKind::IceCandidate);
    assert_eq!(sent[0].code, CODE);
}

// ---------------------------------------------------------------------------
// Relay availability and invalid commands
// ---------------------------------------------------------------------------

#[test]
fn relay_commands_fail_while_disconnected_and_state_holds() {
    let mut c = PairingCoordinator::new();
    assert_eq!(c.create(meta()), Err(SessionError::RelayUnavailable));
    assert_eq!(c.join(CODE), Err(SessionError::RelayUnavailable));
    assert_eq!(c.state(), PairingState::Idle);

    let mut c = connected();
    c.join(CODE).unwrap();
    c.on_relay_message(SignalMessage::joined(CODE, &meta()));
    c.on_relay_disconnected();
    assert_eq!(c.accept(), Err(SessionError::RelayUnavailable));
    assert_eq!(c.decline(), Err(SessionError::RelayUnavailable));
    assert_eq!(c.state(), PairingState::Offered);
}

#[test]
fn relay_reconnect_keeps_the_session() {
    let mut c = sender_with_peer();
    c.on_relay_disconnected();
    c.on_relay_connected();
    assert_eq!(c.state(), PairingState::PeerJoined);
    assert_eq!(c.session().unwrap().code_str(), CODE);
}

#[test]
fn accept_in_wrong_state_is_invalid() {
    let mut c = connected();
    assert_eq!(c.accept(), Err(SessionError::NoActiveSession));

    c.join(CODE).unwrap();
    assert!(matches!(
        c.accept(),
        Err(SessionError::InvalidState { operation: "accept", .. })
    ));
    assert_eq!(c.state(), PairingState::AwaitingOffer);

    let mut sender = sender_with_peer();
    assert!(matches!(
        sender.accept(),
        Err(SessionError::InvalidState { .. })
    ));
}

#[test]
fn message_for_another_code_is_ignored() {
    let mut c = sender_with_peer();
    let effects = c.on_relay_message(SignalMessage::close("999999"));
    assert!(effects.is_empty());
    assert_eq!(c.state(), PairingState::PeerJoined);
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[test]
fn close_is_idempotent() {
    let mut c = sender_with_peer();

    let first = c.close();
    assert_eq!(teardowns(&first), 1);
    assert_eq!(relayed(&first)[0].kind, SignalKind::Close);
    assert_eq!(closed_reason(&first), Some(CloseReason::Local));
    assert_eq!(c.state(), PairingState::Closed);

    assert!(c.close().is_empty());
    assert!(c.close().is_empty());
    assert!(PairingCoordinator::new().close().is_empty());
}

#[test]
fn close_while_relay_down_still_tears_down_locally() {
    let mut c = sender_with_peer();
    c.on_relay_disconnected();
    let effects = c.close();
    assert!(relayed(&effects).is_empty());
    assert_eq!(teardowns(&effects), 1);
}

#[test]
fn decline_tears_down_both_sides_without_negotiation() {
    let mut receiver = connected();
    receiver.join(CODE).unwrap();
    receiver.on_relay_message(SignalMessage::joined(CODE, &meta()));

    let effects = receiver.decline().unwrap();
    let sent = relayed(&effects);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, SignalKind::Close);
    assert_eq!(closed_reason(&effects), Some(CloseReason::Declined));
    assert_eq!(receiver.state(), PairingState::Closed);

    let mut sender = sender_with_peer();
    let effects = sender.on_relay_message(sent[0].clone());
    assert_eq!(teardowns(&effects), 1);
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::Negotiate(_))));
    assert_eq!(sender.state(), PairingState::Closed);
}

#[test]
fn peer_disconnect_reason_is_kept() {
    let mut c = sender_with_peer();
    let effects = c.on_relay_message(SignalMessage::close_with_error(CODE, "Peer disconnected"));
    assert_eq!(
        closed_reason(&effects),
        Some(CloseReason::PeerClosed(Some("Peer disconnected".into())))
    );
}

#[test]
fn relay_error_closes_the_session() {
    let mut c = connected();
    c.join(CODE).unwrap();
    let effects = c.on_relay_message(SignalMessage::error(CODE, "session not found"));
    assert_eq!(
        closed_reason(&effects),
        Some(CloseReason::RelayError("session not found".into()))
    );
    assert_eq!(c.state(), PairingState::Closed);
}

#[test]
fn create_replaces_a_live_session() {
    let mut c = sender_with_peer();
    let effects = c.create(FileMetadata::new("next.txt", 3, "text/plain")).unwrap();

    assert_eq!(teardowns(&effects), 1);
    let kinds: Vec<SignalKind> = relayed(&effects).iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![SignalKind::Close, SignalKind::Create]);
    assert_eq!(c.state(), PairingState::Created);
    assert!(c.session().unwrap().code.is_none());
}

#[test]
fn chunk_before_metadata_is_a_protocol_violation() {
    let mut c = transferring_receiver();
    let effects = c.on_channel_message(&encode_chunk(b"early"));

    assert_eq!(teardowns(&effects), 1);
    assert!(matches!(
        closed_reason(&effects),
        Some(CloseReason::ProtocolViolation(_))
    ));
    assert!(!events(&effects)
        .iter()
        .any(|e| matches!(e, SessionEvent::FileReceived(_))));
    assert_eq!(c.session().unwrap().transfer.chunks_received(), 0);
    assert_eq!(
        CloseReason::ProtocolViolation("x".into()).user_message(),
        CloseReason::PeerClosed(None).user_message()
    );
}

#[test]
fn channel_loss_mid_transfer_is_a_transport_failure() {
    let mut c = transferring_receiver();
    c.on_channel_message(&Frame::Metadata(meta()).encode().unwrap());
    let effects = c.on_channel_closed(None);
    assert!(matches!(
        closed_reason(&effects),
        Some(CloseReason::TransportFailed(_))
    ));
    assert!(c.on_channel_closed(None).is_empty());
}

#[test]
fn timeouts_only_fire_in_their_state() {
    let mut c = sender_with_peer();
    assert!(c.on_timeout(TimeoutKind::Negotiation).is_empty());

    c.on_relay_message(SignalMessage::accept(CODE));
    assert!(c.on_timeout(TimeoutKind::Stall).is_empty());
    let effects = c.on_timeout(TimeoutKind::Negotiation);
    assert_eq!(
        closed_reason(&effects),
        Some(CloseReason::TimedOut(TimeoutKind::Negotiation))
    );
}

#[test]
fn negotiation_failure_converges_on_teardown() {
    let mut c = sender_with_peer();
    c.on_relay_message(SignalMessage::accept(CODE));
    let effects = c.on_negotiation_failed("bad answer");
    assert_eq!(teardowns(&effects), 1);
    assert!(c.on_negotiation_failed("again").is_empty());
}

#[test]
fn answer_reported_after_channel_open_is_still_relayed() {
    let mut c = connected();
    c.join(CODE).unwrap();
    c.on_relay_message(SignalMessage::joined(CODE, &meta()));
    c.accept().unwrap();
    c.on_relay_message(msg(SignalKind::Offer, json!({"type": "offer", "token": "t"})));

    c.on_channel_open();
    assert_eq!(c.state(), PairingState::Transferring);

    let effects = c.on_local_description(json!({"type": "answer", "token": "t"}));
    assert_eq!(relayed(&effects)[0].kind, SignalKind::Answer);

    c.close();
    assert!(c
        .on_local_description(json!({"type": "answer", "token": "t"}))
        .is_empty());
}
