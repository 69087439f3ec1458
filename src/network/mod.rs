//! Network subsystem
//!
//! Poll-driven session layer over non-blocking TCP: listen sockets with a
//! bounded, recycling slot array, framed messages, and an outbound client
//! side. Transport behavior belongs to the OS; this layer only manages
//! sessions.

pub mod client;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod socket;

pub use client::ClientConnection;
pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use error::NetworkResult;
pub use protocol::{DisconnectReason, DEFAULT_PORT, MAX_CONNECTIONS, MAX_MESSAGE_SIZE};
pub use registry::{NetworkContext, SocketHandle};
pub use socket::{ListenSocket, Message, Messages, SocketConfig};
