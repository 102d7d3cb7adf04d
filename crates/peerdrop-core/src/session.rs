//! The one live pairing session of a client.

use peerdrop_common::{FileMetadata, SessionCode};

use crate::pairing::{PairingState, Role};
use crate::transfer::TransferState;

/// Per-session context owned by the coordinator.
#[derive(Debug, Clone)]
pub struct Session {
    /// Fixed for the whole session.
    pub role: Role,
    /// Assigned by the relay (sender) or entered by the user (receiver).
    pub code: Option<SessionCode>,
    pub state: PairingState,
    /// The file on offer: known up front on the sender, from `joined` on the receiver.
    pub metadata: Option<FileMetadata>,
    pub transfer: TransferState,
}

impl Session {
    pub fn sender(metadata: FileMetadata) -> Self {
        Self {
            role: Role::Sender,
            code: None,
            state: PairingState::Idle,
            metadata: Some(metadata),
            transfer: TransferState::new(),
        }
    }

    pub fn receiver(code: SessionCode) -> Self {
        Self {
            role: Role::Receiver,
            code: Some(code),
            state: PairingState::Idle,
            metadata: None,
            transfer: TransferState::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub fn code_str(&self) -> &str {
        self.code.as_ref().map(SessionCode::as_str).unwrap_or("")
    }
}
