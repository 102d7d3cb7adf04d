//! Shared types for peerdrop: the relay wire schema, session codes, and
//! the error enums every crate in the workspace reports through.

pub mod code;
pub mod errors;
pub mod signal;

pub use code::SessionCode;
pub use errors::*;
pub use signal::{FileMetadata, SignalKind, SignalMessage, SignalPayload};
