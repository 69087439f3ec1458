//! Engine-wide error handling
//!
//! Every subsystem reports failures through the single [`EngineError`]
//! taxonomy. Per-subsystem `error.rs` modules provide constructor helpers so
//! call sites stay terse.

use thiserror::Error;

/// Type alias for engine operation results
pub type EngineResult<T> = Result<T, EngineError>;

/// Unified error type for all engine subsystems
#[derive(Debug, Error)]
pub enum EngineError {
    /// A context or world could not be constructed from its configuration
    #[error("engine initialization failed: {reason}")]
    EngineInitFailed { reason: String },

    /// A fixed budget (bodies, connection slots) is full
    #[error("{resource} budget exhausted (limit {limit})")]
    ResourceExhausted { resource: &'static str, limit: usize },

    /// A typed handle does not refer to a live resource
    #[error("invalid {kind} handle")]
    InvalidHandle { kind: &'static str },

    /// A collision layer index is outside the configured layer count
    #[error("collision layer {layer} out of range (layer count {limit})")]
    InvalidLayer { layer: u8, limit: u8 },

    /// Shape construction from caller-supplied buffers failed
    #[error("invalid collision shape: {reason}")]
    InvalidShape { reason: String },

    /// A network message exceeds the framing limit
    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    /// A connection slot holds no live connection
    #[error("connection slot {slot} is not live")]
    ConnectionNotLive { slot: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failing_resource() {
        let err = EngineError::ResourceExhausted {
            resource: "bodies",
            limit: 16,
        };
        assert_eq!(err.to_string(), "bodies budget exhausted (limit 16)");

        let err = EngineError::InvalidHandle { kind: "body" };
        assert_eq!(err.to_string(), "invalid body handle");
    }
}
