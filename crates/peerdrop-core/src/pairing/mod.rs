//! Pairing state machine.
//!
//! [`PairingCoordinator`] performs no I/O. Every input (local command, relay
//! message, transport or transfer event, timer) returns the ordered list of
//! [`Effect`]s the client runtime must carry out.

mod coordinator;
mod types;

pub use coordinator::PairingCoordinator;
pub use types::{
    CloseReason, Effect, NegotiationStep, PairingState, Progress, Role, SessionEvent, TimeoutKind,
};

#[cfg(test)]
mod tests;
