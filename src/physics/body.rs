//! Body identifiers and flat state records

use glam::{Quat, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

/// Typed opaque identifier for a body tracked by the physics world.
///
/// Valid only between the body's add and remove calls; every lookup through
/// a `BodyId` is validated, and stale ids surface
/// [`EngineError::InvalidHandle`](crate::EngineError::InvalidHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub(crate) RigidBodyHandle);

impl BodyId {
    /// Pack the id into 64 bits for host-side storage.
    pub fn to_bits(self) -> u64 {
        let (index, generation) = self.0.into_raw_parts();
        (u64::from(generation) << 32) | u64::from(index)
    }

    /// Rebuild an id previously packed with [`BodyId::to_bits`].
    ///
    /// The result is only meaningful if the packed id came from this
    /// process; it is still validated against the live body set on use.
    pub fn from_bits(bits: u64) -> Self {
        BodyId(RigidBodyHandle::from_raw_parts(
            bits as u32,
            (bits >> 32) as u32,
        ))
    }
}

/// Flat snapshot of a body's engine-visible state.
///
/// Produced by `PhysicsWorld::body_state` and applied back with
/// `PhysicsWorld::set_body_state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub gravity_factor: f32,
    pub is_sensor: bool,
    pub is_active: bool,
    pub layer: u8,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            gravity_factor: 1.0,
            is_sensor: false,
            is_active: true,
            layer: 0,
        }
    }
}

/// Vertex/index buffers describing one mesh of a compound shape.
#[derive(Debug, Clone, Copy)]
pub struct MeshData<'a> {
    pub vertices: &'a [Vec3],
    pub indices: &'a [u32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_id_bits_round_trip() {
        let handle = RigidBodyHandle::from_raw_parts(42, 7);
        let id = BodyId(handle);
        assert_eq!(BodyId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn default_state_is_resting_and_awake() {
        let state = BodyState::default();
        assert_eq!(state.linear_velocity, Vec3::ZERO);
        assert_eq!(state.gravity_factor, 1.0);
        assert!(state.is_active);
        assert!(!state.is_sensor);
    }
}
