//! peerdrop client core.
//!
//! Pairing over a signaling relay, negotiation of a direct transport, and
//! the chunked file transfer that runs over it.

pub mod client;
pub mod pairing;
pub mod relay;
pub mod session;
pub mod transfer;
pub mod transport;

pub use client::{ClientConfig, PeerdropClient};
pub use pairing::{CloseReason, PairingCoordinator, PairingState, Progress, Role, SessionEvent};
pub use relay::{RelayClient, RelayClientConfig, RelayEvent};
pub use session::Session;
pub use transfer::ReceivedFile;
pub use transport::{MemoryNetwork, TcpTransportConfig, TcpTransportFactory};
