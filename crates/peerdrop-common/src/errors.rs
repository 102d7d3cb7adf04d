use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures raised by the pairing state machine and the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The relay channel is down; the command was not sent and no state changed.
    #[error("not connected to server")]
    RelayUnavailable,

    /// Connected, but the outbound queue is full; the message was dropped.
    #[error("relay send queue is full")]
    RelayBusy,

    #[error("invalid session code: {0}")]
    InvalidCode(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("no active session")]
    NoActiveSession,

}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("negotiation error: {0}")]
    Negotiation(String),

    #[error("data channel closed")]
    ChannelClosed,

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PeerdropError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PeerdropError>;
