pub mod error;
pub mod math;
pub mod network;
pub mod physics;

pub use error::{EngineError, EngineResult};
pub use network::{
    ClientConnection, ConnectionState, DisconnectReason, Message, NetworkContext, SocketConfig,
    SocketHandle,
};
pub use physics::{
    BodyId, BodyState, Character, CharacterSettings, CharacterUpdateSettings, CharacterVirtual,
    ContactEvent, GroundState, LayerTable, MeshData, PhysicsConfig, PhysicsWorld,
};
