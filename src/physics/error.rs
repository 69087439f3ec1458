//! Physics subsystem error handling
//!
//! Type alias and constructor helpers so physics call sites report through
//! the engine-wide taxonomy without repeating struct literals.

use crate::error::{EngineError, EngineResult};

/// Type alias for physics operation results
pub type PhysicsResult<T> = EngineResult<T>;

/// The world's body budget is full.
pub fn body_budget_exhausted(limit: usize) -> EngineError {
    EngineError::ResourceExhausted {
        resource: "bodies",
        limit,
    }
}

/// A `BodyId` does not refer to a live body.
pub fn invalid_body_handle() -> EngineError {
    EngineError::InvalidHandle { kind: "body" }
}

/// Shape construction from caller buffers failed.
pub fn invalid_shape(error: impl std::fmt::Display) -> EngineError {
    EngineError::InvalidShape {
        reason: error.to_string(),
    }
}

/// A layer index is outside the world's layer table.
pub fn layer_out_of_range(layer: u8, limit: u8) -> EngineError {
    EngineError::InvalidLayer { layer, limit }
}
