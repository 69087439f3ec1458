//! Character controllers
//!
//! Two movement abstractions over a capsule body, both Z-up with the
//! origin at the feet:
//!
//! * [`CharacterVirtual`]: kinematic controller driven through the
//!   engine's character solver (stair-stepping, floor-snapping, dynamic
//!   push-back). The character owns its position; an inner kinematic body
//!   mirrors it so the rest of the world can collide with it.
//! * [`Character`]: a plain dynamic body with locked rotations plus a
//!   ground probe and a post-step floor snap.
//!
//! Ground state is surfaced raw every tick; there is no smoothing or
//! hysteresis on top of the engine's classification.

use glam::{Mat4, Quat, Vec3};
use nalgebra as na;
use rapier3d::control::{
    CharacterAutostep, CharacterCollision, CharacterLength, KinematicCharacterController,
};
use rapier3d::prelude::{
    ActiveEvents, ActiveHooks, Capsule, ColliderBuilder, QueryFilter, Ray, RigidBodyBuilder,
    RigidBodyType,
};
use serde::{Deserialize, Serialize};

use super::body::BodyId;
use super::error::PhysicsResult;
use super::world::PhysicsWorld;
use crate::math::{from_na, to_iso, to_na, to_na_point, transform_matrix};

/// Classification of a character's contact with supporting geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundState {
    /// Standing on walkable geometry; free to move.
    OnGround,
    /// Touching a slope steeper than the climb limit.
    OnSteepGround,
    /// Touching something, but nothing is holding the character up.
    NotSupported,
    /// No contacts at all.
    InAir,
}

/// Construction parameters shared by both character variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CharacterSettings {
    /// Steepest walkable slope, in radians.
    pub max_slope_angle: f32,
    /// Collision padding kept between the capsule and the world.
    pub padding: f32,
    /// Cylindrical section height; total capsule height adds two radii.
    pub standing_height: f32,
    pub standing_radius: f32,
    pub mass: f32,
    pub layer: u8,
}

impl Default for CharacterSettings {
    fn default() -> Self {
        Self {
            max_slope_angle: 50f32.to_radians(),
            padding: 0.02,
            standing_height: 1.35,
            standing_radius: 0.3,
            mass: 70.0,
            layer: 0,
        }
    }
}

/// Per-tick update parameters for [`CharacterVirtual::update`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CharacterUpdateSettings {
    /// How far below the feet to look when snapping to the floor.
    pub step_down: Vec3,
    /// Tallest obstacle treated as a stair step.
    pub step_up: Vec3,
    /// Minimum horizontal clearance required on top of a step.
    pub min_step_forward: f32,
    pub layer: u8,
}

impl Default for CharacterUpdateSettings {
    fn default() -> Self {
        Self {
            step_down: Vec3::new(0.0, 0.0, -0.5),
            step_up: Vec3::new(0.0, 0.0, 0.4),
            min_step_forward: 0.125,
            layer: 0,
        }
    }
}

fn classify_ground(grounded: bool, sliding: bool, touching: bool) -> GroundState {
    if grounded {
        if sliding {
            GroundState::OnSteepGround
        } else {
            GroundState::OnGround
        }
    } else if touching {
        GroundState::NotSupported
    } else {
        GroundState::InAir
    }
}

/// Kinematic character controller.
pub struct CharacterVirtual {
    body: BodyId,
    shape: Capsule,
    shape_offset: f32,
    settings: CharacterSettings,
    position: Vec3,
    rotation: Quat,
    up: Vec3,
    linear_velocity: Vec3,
    ground_state: GroundState,
    ground_body: Option<BodyId>,
    ground_normal: Vec3,
    ground_velocity: Vec3,
    dynamic_contacts: Vec<BodyId>,
    collisions: Vec<CharacterCollision>,
}

impl CharacterVirtual {
    /// Create the character and its inner kinematic body at `position`.
    pub fn create(
        world: &mut PhysicsWorld,
        settings: &CharacterSettings,
        position: Vec3,
    ) -> PhysicsResult<Self> {
        world.check_body_budget()?;
        world.check_layer(settings.layer)?;

        let shape_offset = 0.5 * settings.standing_height + settings.standing_radius;
        let body = world.bodies.insert(
            RigidBodyBuilder::kinematic_position_based()
                .position(to_iso(position, Quat::IDENTITY)),
        );
        world.colliders.insert_with_parent(
            ColliderBuilder::capsule_z(0.5 * settings.standing_height, settings.standing_radius)
                .position(rapier3d::math::Isometry::translation(0.0, 0.0, shape_offset))
                .collision_groups(world.layers.interaction_groups(settings.layer))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .active_hooks(
                    ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR,
                )
                .user_data(settings.layer as u128),
            body,
            &mut world.bodies,
        );

        Ok(Self {
            body: BodyId(body),
            shape: Capsule::new_z(0.5 * settings.standing_height, settings.standing_radius),
            shape_offset,
            settings: *settings,
            position,
            rotation: Quat::IDENTITY,
            up: Vec3::Z,
            linear_velocity: Vec3::ZERO,
            ground_state: GroundState::InAir,
            ground_body: None,
            ground_normal: Vec3::Z,
            ground_velocity: Vec3::ZERO,
            dynamic_contacts: Vec::new(),
            collisions: Vec::new(),
        })
    }

    /// Remove the character and its inner body from the world.
    pub fn destroy(self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        world.remove_body(self.body)
    }

    /// One simulation tick: gravity integration, collide-and-slide with
    /// stair-stepping and floor-snapping, push-back on touched dynamic
    /// bodies, and ground classification.
    pub fn update(
        &mut self,
        world: &mut PhysicsWorld,
        dt: f32,
        settings: &CharacterUpdateSettings,
    ) -> PhysicsResult<()> {
        if dt <= 0.0 {
            return Ok(());
        }
        world.check_layer(settings.layer)?;
        world.refresh_queries();

        let up = self.up_axis();
        if self.ground_state == GroundState::OnGround {
            // Standing: cancel any velocity into the floor.
            let into_ground = self.linear_velocity.dot(up);
            if into_ground < 0.0 {
                self.linear_velocity -= up * into_ground;
            }
        } else {
            self.linear_velocity += world.gravity() * dt;
        }

        let desired = self.linear_velocity * dt;
        let controller = self.controller(up, settings);
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.body.0)
            .exclude_sensors()
            .groups(world.layers.interaction_groups(settings.layer));
        let shape_pos = to_iso(self.center_of_mass_position(), self.rotation);

        self.collisions.clear();
        let collisions = &mut self.collisions;
        let movement = controller.move_shape(
            dt,
            &world.bodies,
            &world.colliders,
            &world.query_pipeline,
            &self.shape,
            &shape_pos,
            to_na(desired),
            filter,
            |collision| collisions.push(collision),
        );

        controller.solve_character_collision_impulses(
            dt,
            &mut world.bodies,
            &world.colliders,
            &world.query_pipeline,
            &self.shape,
            self.settings.mass,
            self.collisions.iter(),
            filter,
        );

        self.position += from_na(&movement.translation);
        if let Ok(body) = world.body_mut(self.body) {
            body.set_next_kinematic_position(to_iso(self.position, self.rotation));
        }

        self.ground_state = classify_ground(
            movement.grounded,
            movement.is_sliding_down_slope,
            !self.collisions.is_empty(),
        );

        self.ground_body = None;
        self.ground_normal = up;
        self.dynamic_contacts.clear();
        let mut best_support = 0.0;
        for collision in &self.collisions {
            let Some(parent) = world
                .colliders
                .get(collision.handle)
                .and_then(|collider| collider.parent())
            else {
                continue;
            };
            let normal = -from_na(&collision.hit.normal1);
            let support = normal.dot(up);
            if support > best_support {
                best_support = support;
                self.ground_body = Some(BodyId(parent));
                self.ground_normal = normal;
            }
            if let Some(body) = world.bodies.get(parent) {
                if body.body_type() == RigidBodyType::Dynamic {
                    let id = BodyId(parent);
                    if !self.dynamic_contacts.contains(&id) {
                        self.dynamic_contacts.push(id);
                    }
                }
            }
        }
        self.update_ground_velocity(world);
        Ok(())
    }

    /// Re-evaluate contacts and ground state at the current pose without
    /// moving the character.
    pub fn refresh_contacts(&mut self, world: &mut PhysicsWorld, layer: u8) -> PhysicsResult<()> {
        world.check_layer(layer)?;
        world.refresh_queries();

        let up = self.up_axis();
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.body.0)
            .exclude_sensors()
            .groups(world.layers.interaction_groups(layer));

        // Slightly sunken overlap probe: resting contacts live inside the
        // padding band and would otherwise be missed.
        let probe_pos = to_iso(
            self.center_of_mass_position() - up * self.settings.padding,
            self.rotation,
        );
        let mut touching = false;
        world.query_pipeline.intersections_with_shape(
            &world.bodies,
            &world.colliders,
            &probe_pos,
            &self.shape,
            filter,
            |_| {
                touching = true;
                false
            },
        );

        let ray = Ray::new(to_na_point(self.position + up * 0.01), to_na(-up));
        let max_toi = 0.01 + self.settings.padding + 0.05;
        match world.query_pipeline.cast_ray_and_get_normal(
            &world.bodies,
            &world.colliders,
            &ray,
            max_toi,
            true,
            filter,
        ) {
            Some((handle, hit)) => {
                let normal = from_na(&hit.normal);
                let steep =
                    normal.dot(up).clamp(-1.0, 1.0).acos() > self.settings.max_slope_angle;
                self.ground_normal = normal;
                self.ground_body = world
                    .colliders
                    .get(handle)
                    .and_then(|collider| collider.parent())
                    .map(BodyId);
                self.ground_state = if steep {
                    GroundState::OnSteepGround
                } else {
                    GroundState::OnGround
                };
            }
            None => {
                self.ground_body = None;
                self.ground_normal = up;
                self.ground_state = if touching {
                    GroundState::NotSupported
                } else {
                    GroundState::InAir
                };
            }
        }
        self.update_ground_velocity(world);
        Ok(())
    }

    /// Velocity of whatever the character is standing on, at the feet.
    pub fn ground_velocity(&self) -> Vec3 {
        self.ground_velocity
    }

    /// Recompute [`ground_velocity`](Self::ground_velocity) from the
    /// supporting body's current motion.
    pub fn update_ground_velocity(&mut self, world: &PhysicsWorld) {
        self.ground_velocity = self
            .ground_body
            .and_then(|id| world.bodies.get(id.0))
            .map(|body| from_na(&body.velocity_at_point(&to_na_point(self.position))))
            .unwrap_or(Vec3::ZERO);
    }

    pub fn ground_state(&self) -> GroundState {
        self.ground_state
    }

    pub fn is_slope_too_steep(&self) -> bool {
        let cos = self.ground_normal.dot(self.up_axis()).clamp(-1.0, 1.0);
        cos.acos() > self.settings.max_slope_angle
    }

    /// One-shot iterator over dynamic bodies touched during the last
    /// update. Draining; not restartable.
    pub fn drain_dynamic_contacts(&mut self) -> impl Iterator<Item = BodyId> + '_ {
        self.dynamic_contacts.drain(..)
    }

    pub fn body_id(&self) -> BodyId {
        self.body
    }

    pub fn world_transform(&self) -> Mat4 {
        transform_matrix(self.position, self.rotation)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn center_of_mass_position(&self) -> Vec3 {
        self.position + self.rotation * (Vec3::Z * self.shape_offset)
    }

    /// Teleport; contacts are stale until the next update or refresh.
    pub fn set_position(&mut self, world: &mut PhysicsWorld, position: Vec3) {
        self.position = position;
        if let Ok(body) = world.body_mut(self.body) {
            body.set_position(to_iso(position, self.rotation), true);
        }
    }

    pub fn set_rotation(&mut self, world: &mut PhysicsWorld, rotation: Quat) {
        self.rotation = rotation;
        if let Ok(body) = world.body_mut(self.body) {
            body.set_position(to_iso(self.position, rotation), true);
        }
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    fn up_axis(&self) -> Vec3 {
        if self.up.length_squared() > 0.0 {
            self.up.normalize()
        } else {
            Vec3::Z
        }
    }

    fn controller(
        &self,
        up: Vec3,
        settings: &CharacterUpdateSettings,
    ) -> KinematicCharacterController {
        let step_height = settings.step_up.length();
        let autostep = (step_height > 0.0).then(|| CharacterAutostep {
            max_height: CharacterLength::Absolute(step_height),
            min_width: CharacterLength::Absolute(settings.min_step_forward.max(0.01)),
            include_dynamic_bodies: false,
        });
        let snap_depth = settings.step_down.length();
        let snap_to_ground = (snap_depth > 0.0).then(|| CharacterLength::Absolute(snap_depth));

        KinematicCharacterController {
            up: na::Unit::new_normalize(to_na(up)),
            offset: CharacterLength::Absolute(self.settings.padding.max(1e-3)),
            slide: true,
            autostep,
            max_slope_climb_angle: self.settings.max_slope_angle,
            min_slope_slide_angle: self.settings.max_slope_angle,
            snap_to_ground,
            ..Default::default()
        }
    }
}

/// Rigid-body character: a dynamic capsule with locked rotations.
pub struct Character {
    body: BodyId,
    settings: CharacterSettings,
    shape_offset: f32,
}

impl Character {
    pub fn create(
        world: &mut PhysicsWorld,
        settings: &CharacterSettings,
        position: Vec3,
        owner_tag: u64,
    ) -> PhysicsResult<Self> {
        world.check_body_budget()?;
        world.check_layer(settings.layer)?;

        let shape_offset = 0.5 * settings.standing_height + settings.standing_radius;
        let body = world.bodies.insert(
            RigidBodyBuilder::dynamic()
                .position(to_iso(position, Quat::IDENTITY))
                .lock_rotations()
                .additional_mass(settings.mass)
                .user_data(owner_tag as u128),
        );
        world.colliders.insert_with_parent(
            ColliderBuilder::capsule_z(0.5 * settings.standing_height, settings.standing_radius)
                .position(rapier3d::math::Isometry::translation(0.0, 0.0, shape_offset))
                .collision_groups(world.layers.interaction_groups(settings.layer))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .active_hooks(
                    ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR,
                )
                .user_data(settings.layer as u128),
            body,
            &mut world.bodies,
        );

        Ok(Self {
            body: BodyId(body),
            settings: *settings,
            shape_offset,
        })
    }

    pub fn destroy(self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        world.remove_body(self.body)
    }

    pub fn body_id(&self) -> BodyId {
        self.body
    }

    pub fn world_transform(&self, world: &PhysicsWorld) -> PhysicsResult<Mat4> {
        let (position, rotation) = world.position_and_rotation(self.body)?;
        Ok(transform_matrix(position, rotation))
    }

    pub fn position(&self, world: &PhysicsWorld) -> PhysicsResult<Vec3> {
        world.position(self.body)
    }

    pub fn set_position(&self, world: &mut PhysicsWorld, position: Vec3) -> PhysicsResult<()> {
        world.set_position(self.body, position)
    }

    pub fn center_of_mass_position(&self, world: &PhysicsWorld) -> PhysicsResult<Vec3> {
        world.center_of_mass_position(self.body)
    }

    pub fn linear_velocity(&self, world: &PhysicsWorld) -> PhysicsResult<Vec3> {
        Ok(world.velocity(self.body)?.0)
    }

    pub fn set_linear_velocity(
        &self,
        world: &mut PhysicsWorld,
        velocity: Vec3,
    ) -> PhysicsResult<()> {
        world.set_velocity_and_activate(self.body, velocity, Vec3::ZERO)
    }

    pub fn is_on_ground(&self, world: &mut PhysicsWorld) -> PhysicsResult<bool> {
        Ok(match self.ground_probe(world, self.settings.padding + 0.05)? {
            Some((_, normal, _)) => {
                normal.dot(Vec3::Z).clamp(-1.0, 1.0).acos() <= self.settings.max_slope_angle
            }
            None => false,
        })
    }

    pub fn ground_velocity(&self, world: &mut PhysicsWorld) -> PhysicsResult<Vec3> {
        let position = self.position(world)?;
        Ok(self
            .ground_probe(world, self.settings.padding + 0.05)?
            .and_then(|(body, _, _)| world.bodies.get(body.0))
            .map(|body| from_na(&body.velocity_at_point(&to_na_point(position))))
            .unwrap_or(Vec3::ZERO))
    }

    /// Snap back onto the floor after a simulation step, if the ground is
    /// within `max_separation` below the feet and the character is not
    /// moving upward.
    pub fn post_update(&self, world: &mut PhysicsWorld, max_separation: f32) -> PhysicsResult<()> {
        let (linear, angular) = world.velocity(self.body)?;
        if linear.dot(Vec3::Z) > 1e-3 {
            return Ok(());
        }

        if let Some((_, _, distance)) = self.ground_probe(world, max_separation)? {
            let position = self.position(world)?;
            if distance > 0.0 {
                world.set_position(self.body, position - Vec3::Z * distance)?;
            }
            let downward = linear.dot(Vec3::Z);
            if downward < 0.0 {
                world.set_velocity(self.body, linear - Vec3::Z * downward, angular)?;
            }
        }
        Ok(())
    }

    /// Downward ray from the feet. Returns the supporting body, surface
    /// normal, and distance from the feet to the hit.
    fn ground_probe(
        &self,
        world: &mut PhysicsWorld,
        max_distance: f32,
    ) -> PhysicsResult<Option<(BodyId, Vec3, f32)>> {
        world.refresh_queries();
        let position = self.position(world)?;
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.body.0)
            .exclude_sensors()
            .groups(world.layers.interaction_groups(self.settings.layer));
        let ray = Ray::new(to_na_point(position + Vec3::Z * 0.01), to_na(-Vec3::Z));

        Ok(world
            .query_pipeline
            .cast_ray_and_get_normal(
                &world.bodies,
                &world.colliders,
                &ray,
                max_distance + 0.01,
                true,
                filter,
            )
            .map(|(handle, hit)| {
                let body = world
                    .colliders
                    .get(handle)
                    .and_then(|collider| collider.parent())
                    .map(BodyId)
                    .unwrap_or(self.body);
                (body, from_na(&hit.normal), hit.time_of_impact - 0.01)
            }))
    }

    pub fn settings(&self) -> &CharacterSettings {
        &self.settings
    }

    pub fn capsule_center_offset(&self) -> f32 {
        self.shape_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_classification_covers_all_variants() {
        assert_eq!(classify_ground(true, false, true), GroundState::OnGround);
        assert_eq!(classify_ground(true, true, true), GroundState::OnSteepGround);
        assert_eq!(classify_ground(false, false, true), GroundState::NotSupported);
        assert_eq!(classify_ground(false, false, false), GroundState::InAir);
    }

    #[test]
    fn sliding_without_support_is_not_steep_ground() {
        // The sliding flag only matters while the engine reports support.
        assert_eq!(classify_ground(false, true, true), GroundState::NotSupported);
        assert_eq!(classify_ground(false, true, false), GroundState::InAir);
    }

    #[test]
    fn default_settings_produce_a_standing_capsule() {
        let settings = CharacterSettings::default();
        assert!(settings.standing_height > 0.0);
        assert!(settings.standing_radius > 0.0);
        assert!(settings.max_slope_angle < std::f32::consts::FRAC_PI_2);
    }
}
