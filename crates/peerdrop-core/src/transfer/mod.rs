//! Transfer protocol engine.
//!
//! One metadata frame, then ordered chunks, then a completion frame. The
//! sender streams from any `AsyncRead`; the receiver accumulates into a
//! [`TransferState`] and only exposes the file once it is whole.

pub mod digest;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod state;

pub use frame::{Frame, FrameTag};
pub use receiver::{receive_frame, ReceiveOutcome, ReceivedFile};
pub use sender::{run_sender, send_file, SendUpdate};
pub use state::{chunk_count, chunkify, reassemble, TransferState};

use peerdrop_common::TransportError;

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("protocol violation: {0}")]
    Violation(String),

    #[error("source ended after {read} of {expected} bytes")]
    ShortRead { read: u64, expected: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
