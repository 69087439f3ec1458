//! Physics world: body lifecycle, stepping, and state snapshot/restore
//!
//! Owns the complete engine state and exposes the flat body surface the
//! host drives: explicit add/remove, direct setters, and whole-state
//! snapshot/restore records.

use crossbeam_channel::Receiver;
use glam::{Quat, Vec3};
use rapier3d::prelude::{
    ActiveEvents, ActiveHooks, CCDSolver, ChannelEventCollector, ColliderBuilder, ColliderHandle,
    ColliderSet, CollisionEvent, ContactForceEvent, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryPipeline, RigidBody, RigidBodyBuilder, RigidBodySet, SharedShape,
};
use serde::{Deserialize, Serialize};

use super::body::{BodyId, BodyState, MeshData};
use super::error::{
    body_budget_exhausted, invalid_body_handle, invalid_shape, layer_out_of_range, PhysicsResult,
};
use super::events::{pair_event, ContactEvent, ContactEvents, OwnerTagFilter};
use super::layers::LayerTable;
use super::MAX_BODIES;
use crate::error::EngineResult;
use crate::math::{from_iso, from_na, from_na_point, to_iso, to_na, to_na_point};

/// World construction parameters.
///
/// Gravity starts at zero; callers set it explicitly once the world is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    pub max_bodies: usize,
    pub layers: LayerTable,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            max_bodies: MAX_BODIES,
            layers: LayerTable::default(),
        }
    }
}

/// The physics world.
///
/// Single-threaded and poll-driven: `update` runs to completion on the
/// calling thread. The engine parallelizes collision detection internally;
/// none of that is visible here.
pub struct PhysicsWorld {
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) query_pipeline: QueryPipeline,
    pub(crate) layers: LayerTable,
    gravity: Vec3,
    max_bodies: usize,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    hooks: OwnerTagFilter,
    event_collector: ChannelEventCollector,
    collision_recv: Receiver<CollisionEvent>,
    contact_force_recv: Receiver<ContactForceEvent>,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> EngineResult<Self> {
        if config.max_bodies == 0 {
            return Err(crate::error::EngineError::EngineInitFailed {
                reason: "max_bodies must be nonzero".to_string(),
            });
        }

        let (collision_send, collision_recv) = crossbeam_channel::unbounded();
        let (contact_force_send, contact_force_recv) = crossbeam_channel::unbounded();

        Ok(Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
            layers: config.layers,
            gravity: config.gravity,
            max_bodies: config.max_bodies,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            hooks: OwnerTagFilter,
            event_collector: ChannelEventCollector::new(collision_send, contact_force_send),
            collision_recv,
            contact_force_recv,
        })
    }

    /// Advance the simulation by `delta_time`, split into `collision_steps`
    /// sub-steps. Synchronous; returns when the step is complete.
    pub fn update(&mut self, delta_time: f32, collision_steps: u32) {
        let steps = collision_steps.max(1);
        self.params.dt = delta_time / steps as f32;
        let gravity = to_na(self.gravity);

        for _ in 0..steps {
            self.pipeline.step(
                &gravity,
                &self.params,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                Some(&mut self.query_pipeline),
                &self.hooks,
                &self.event_collector,
            );
        }

        // Contact-force events are not surfaced; keep the channel empty.
        while self.contact_force_recv.try_recv().is_ok() {}
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // ---- body creation ------------------------------------------------

    pub fn add_dynamic_box(
        &mut self,
        half_extents: Vec3,
        density: f32,
        mass: f32,
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.add_body(true, shape, density, mass, owner_tag, state)
    }

    pub fn add_dynamic_sphere(
        &mut self,
        radius: f32,
        density: f32,
        mass: f32,
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        self.add_body(true, SharedShape::ball(radius), density, mass, owner_tag, state)
    }

    pub fn add_static_box(
        &mut self,
        half_extents: Vec3,
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.add_body(false, shape, 0.0, 0.0, owner_tag, state)
    }

    pub fn add_static_mesh(
        &mut self,
        vertices: &[Vec3],
        indices: &[u32],
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        let shape = mesh_shape(vertices, indices)?;
        self.add_body(false, shape, 0.0, 0.0, owner_tag, state)
    }

    /// Fuse several meshes into a single static compound body.
    pub fn add_static_compound_mesh(
        &mut self,
        meshes: &[MeshData<'_>],
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        let mut parts = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            parts.push((
                rapier3d::math::Isometry::identity(),
                mesh_shape(mesh.vertices, mesh.indices)?,
            ));
        }
        let shape = SharedShape::compound(parts);
        self.add_body(false, shape, 0.0, 0.0, owner_tag, state)
    }

    pub(crate) fn add_body(
        &mut self,
        dynamic: bool,
        shape: SharedShape,
        density: f32,
        mass: f32,
        owner_tag: u64,
        state: &BodyState,
    ) -> PhysicsResult<BodyId> {
        self.check_body_budget()?;
        self.check_layer(state.layer)?;

        let mut builder = if dynamic {
            RigidBodyBuilder::dynamic()
                .linvel(to_na(state.linear_velocity))
                .angvel(to_na(state.angular_velocity))
                .sleeping(!state.is_active)
        } else {
            RigidBodyBuilder::fixed()
        };
        builder = builder
            .position(to_iso(state.position, state.rotation))
            .gravity_scale(state.gravity_factor)
            .user_data(owner_tag as u128);
        if mass > 0.0 {
            builder = builder.additional_mass(mass);
        }

        let handle = self.bodies.insert(builder);
        let collider = ColliderBuilder::new(shape)
            .density(density.max(0.0))
            .sensor(state.is_sensor)
            .collision_groups(self.layers.interaction_groups(state.layer))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR)
            .user_data(state.layer as u128);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        log::debug!(
            "[PhysicsWorld] added {} body {:?} on layer {}",
            if dynamic { "dynamic" } else { "static" },
            handle,
            state.layer
        );
        Ok(BodyId(handle))
    }

    // ---- body lifecycle ------------------------------------------------

    pub fn remove_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        self.bodies
            .remove(
                id.0,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .ok_or_else(invalid_body_handle)?;
        log::debug!("[PhysicsWorld] removed body {:?}", id.0);
        Ok(())
    }

    pub fn activate_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        self.body_mut(id)?.wake_up(true);
        Ok(())
    }

    pub fn deactivate_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        self.body_mut(id)?.sleep();
        Ok(())
    }

    pub fn is_body_active(&self, id: BodyId) -> PhysicsResult<bool> {
        let body = self.body(id)?;
        Ok(!body.is_fixed() && !body.is_sleeping())
    }

    // ---- direct accessors and mutators ---------------------------------

    pub fn owner_tag(&self, id: BodyId) -> PhysicsResult<u64> {
        Ok(self.body(id)?.user_data as u64)
    }

    pub fn set_owner_tag(&mut self, id: BodyId, owner_tag: u64) -> PhysicsResult<()> {
        self.body_mut(id)?.user_data = owner_tag as u128;
        Ok(())
    }

    pub fn position(&self, id: BodyId) -> PhysicsResult<Vec3> {
        Ok(from_na(&self.body(id)?.position().translation.vector))
    }

    pub fn position_and_rotation(&self, id: BodyId) -> PhysicsResult<(Vec3, Quat)> {
        Ok(from_iso(self.body(id)?.position()))
    }

    pub fn center_of_mass_position(&self, id: BodyId) -> PhysicsResult<Vec3> {
        let body = self.body(id)?;
        let local_com = body.mass_properties().local_mprops.local_com;
        Ok(from_na_point(&body.position().transform_point(&local_com)))
    }

    pub fn velocity(&self, id: BodyId) -> PhysicsResult<(Vec3, Vec3)> {
        let body = self.body(id)?;
        Ok((from_na(body.linvel()), from_na(body.angvel())))
    }

    /// Move a body without touching its activation state.
    pub fn set_position(&mut self, id: BodyId, position: Vec3) -> PhysicsResult<()> {
        let body = self.body_mut(id)?;
        let wake = !body.is_sleeping();
        body.set_translation(to_na(position), wake);
        Ok(())
    }

    pub fn set_position_and_rotation(
        &mut self,
        id: BodyId,
        position: Vec3,
        rotation: Quat,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(id)?;
        let wake = !body.is_sleeping();
        body.set_position(to_iso(position, rotation), wake);
        Ok(())
    }

    /// Velocity write; ignored while the body is deactivated.
    pub fn set_velocity(
        &mut self,
        id: BodyId,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(id)?;
        if !body.is_sleeping() && !body.is_fixed() {
            body.set_linvel(to_na(linear_velocity), false);
            body.set_angvel(to_na(angular_velocity), false);
        }
        Ok(())
    }

    /// Velocity write that also wakes the body.
    pub fn set_velocity_and_activate(
        &mut self,
        id: BodyId,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(id)?;
        if !body.is_fixed() {
            body.set_linvel(to_na(linear_velocity), true);
            body.set_angvel(to_na(angular_velocity), true);
        }
        Ok(())
    }

    pub fn set_position_and_rotation_and_velocity(
        &mut self,
        id: BodyId,
        position: Vec3,
        rotation: Quat,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(id)?;
        if !body.is_sleeping() && !body.is_fixed() {
            body.set_position(to_iso(position, rotation), true);
            body.set_linvel(to_na(linear_velocity), true);
            body.set_angvel(to_na(angular_velocity), true);
        } else {
            body.set_position(to_iso(position, rotation), false);
        }
        Ok(())
    }

    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec3) -> PhysicsResult<()> {
        self.body_mut(id)?.apply_impulse(to_na(impulse), true);
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, id: BodyId, impulse: Vec3) -> PhysicsResult<()> {
        self.body_mut(id)?.apply_torque_impulse(to_na(impulse), true);
        Ok(())
    }

    pub fn gravity_factor(&self, id: BodyId) -> PhysicsResult<f32> {
        Ok(self.body(id)?.gravity_scale())
    }

    pub fn set_gravity_factor(&mut self, id: BodyId, factor: f32) -> PhysicsResult<()> {
        self.body_mut(id)?.set_gravity_scale(factor, false);
        Ok(())
    }

    /// True when the two bodies currently touch (solid contact or sensor
    /// overlap).
    pub fn are_bodies_colliding(&self, a: BodyId, b: BodyId) -> PhysicsResult<bool> {
        let ca = self.primary_collider(a)?;
        let cb = self.primary_collider(b)?;
        if let Some(pair) = self.narrow_phase.contact_pair(ca, cb) {
            if pair.has_any_active_contact {
                return Ok(true);
            }
        }
        Ok(self.narrow_phase.intersection_pair(ca, cb) == Some(true))
    }

    // ---- state snapshot/restore ----------------------------------------

    /// Read the body's engine-visible state into a flat record.
    pub fn body_state(&self, id: BodyId) -> PhysicsResult<BodyState> {
        let body = self.body(id)?;
        let collider_handle = self.primary_collider(id)?;
        let collider = self
            .colliders
            .get(collider_handle)
            .ok_or_else(invalid_body_handle)?;
        let (position, rotation) = from_iso(body.position());

        Ok(BodyState {
            position,
            rotation,
            linear_velocity: from_na(body.linvel()),
            angular_velocity: from_na(body.angvel()),
            gravity_factor: body.gravity_scale(),
            is_sensor: collider.is_sensor(),
            is_active: !body.is_fixed() && !body.is_sleeping(),
            layer: collider.user_data as u8,
        })
    }

    /// Apply a snapshot back onto a body.
    ///
    /// Position and rotation are written unconditionally (without waking).
    /// Velocity is suppressed for static bodies. Sensor, activation, and
    /// layer are written only when they differ from the body's current
    /// values, so an unchanged snapshot causes no engine calls.
    pub fn set_body_state(&mut self, id: BodyId, state: &BodyState) -> PhysicsResult<()> {
        self.check_layer(state.layer)?;

        let body = self.body_mut(id)?;
        body.set_position(to_iso(state.position, state.rotation), false);

        if !body.is_fixed() {
            body.set_linvel(to_na(state.linear_velocity), false);
            body.set_angvel(to_na(state.angular_velocity), false);
        }

        if (body.gravity_scale() - state.gravity_factor).abs() > f32::EPSILON {
            body.set_gravity_scale(state.gravity_factor, false);
        }

        if !body.is_fixed() {
            let active = !body.is_sleeping();
            if active != state.is_active {
                if state.is_active {
                    body.wake_up(true);
                } else {
                    body.sleep();
                }
            }
        }

        let collider_handle = self.primary_collider(id)?;
        let groups = self.layers.interaction_groups(state.layer);
        let collider = self
            .colliders
            .get_mut(collider_handle)
            .ok_or_else(invalid_body_handle)?;
        if collider.is_sensor() != state.is_sensor {
            collider.set_sensor(state.is_sensor);
        }
        if collider.user_data as u8 != state.layer {
            collider.user_data = state.layer as u128;
            collider.set_collision_groups(groups);
        }
        Ok(())
    }

    // ---- contact events ------------------------------------------------

    /// One-shot iterator over contacts started since the last drain.
    pub fn drain_contact_events(&mut self) -> ContactEvents<'_> {
        ContactEvents {
            receiver: &self.collision_recv,
            bodies: &self.bodies,
            colliders: &self.colliders,
            narrow_phase: &self.narrow_phase,
        }
    }

    /// Currently-touching body pairs.
    pub fn active_contacts(&self) -> impl Iterator<Item = ContactEvent> + '_ {
        self.narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .filter_map(move |pair| {
                pair_event(&self.bodies, &self.colliders, &self.narrow_phase, pair)
            })
    }

    // ---- internals -----------------------------------------------------

    pub(crate) fn check_body_budget(&self) -> PhysicsResult<()> {
        if self.bodies.len() >= self.max_bodies {
            log::error!(
                "[PhysicsWorld] cannot add body - budget of {} exhausted",
                self.max_bodies
            );
            return Err(body_budget_exhausted(self.max_bodies));
        }
        Ok(())
    }

    pub(crate) fn check_layer(&self, layer: u8) -> PhysicsResult<()> {
        if !self.layers.contains(layer) {
            return Err(layer_out_of_range(layer, self.layers.layer_count()));
        }
        Ok(())
    }

    pub(crate) fn body(&self, id: BodyId) -> PhysicsResult<&RigidBody> {
        self.bodies.get(id.0).ok_or_else(invalid_body_handle)
    }

    pub(crate) fn body_mut(&mut self, id: BodyId) -> PhysicsResult<&mut RigidBody> {
        self.bodies.get_mut(id.0).ok_or_else(invalid_body_handle)
    }

    pub(crate) fn primary_collider(&self, id: BodyId) -> PhysicsResult<ColliderHandle> {
        self.body(id)?
            .colliders()
            .first()
            .copied()
            .ok_or_else(invalid_body_handle)
    }

    /// Rebuild query acceleration structures after out-of-step mutations.
    pub(crate) fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.colliders);
    }
}

fn mesh_shape(vertices: &[Vec3], indices: &[u32]) -> PhysicsResult<SharedShape> {
    let points = vertices.iter().map(|v| to_na_point(*v)).collect();
    let triangles: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|tri| [tri[0], tri[1], tri[2]])
        .collect();
    if triangles.is_empty() {
        return Err(invalid_shape("a triangle mesh must contain at least one triangle"));
    }
    Ok(SharedShape::trimesh(points, triangles))
}
