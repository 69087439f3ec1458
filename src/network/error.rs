//! Network subsystem error handling
//!
//! Type alias and constructor helpers for the engine-wide taxonomy.

use crate::error::{EngineError, EngineResult};

/// Type alias for network operation results
pub type NetworkResult<T> = EngineResult<T>;

/// A `SocketHandle` does not refer to a live listen socket.
pub fn invalid_socket_handle() -> EngineError {
    EngineError::InvalidHandle { kind: "socket" }
}

/// A connection slot holds no live connection.
pub fn connection_not_live(slot: usize) -> EngineError {
    EngineError::ConnectionNotLive { slot }
}

/// A message exceeds the framing limit.
pub fn message_too_large(size: usize) -> EngineError {
    EngineError::MessageTooLarge {
        size,
        limit: super::protocol::MAX_MESSAGE_SIZE,
    }
}
