//! Physics subsystem
//!
//! Body lifecycle, state snapshot/restore, contact events, and the
//! character movement layer, all built on the `rapier3d` engine. Everything
//! here is synchronous and driven from the owning application's main loop.

pub mod body;
pub mod character;
pub mod error;
pub mod events;
pub mod layers;
pub mod world;

pub use body::{BodyId, BodyState, MeshData};
pub use character::{
    Character, CharacterSettings, CharacterUpdateSettings, CharacterVirtual, GroundState,
};
pub use error::PhysicsResult;
pub use events::{ContactEvent, ContactEvents};
pub use layers::{LayerTable, MAX_LAYERS};
pub use world::{PhysicsConfig, PhysicsWorld};

/// Default rigid-body budget for a world
pub const MAX_BODIES: usize = 65536;
