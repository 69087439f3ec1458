//! Contact events and contact filtering
//!
//! New contacts are collected through the engine's channel-based event
//! collector during `PhysicsWorld::update` and surfaced as a one-shot
//! draining iterator instead of callbacks. Currently-touching pairs are
//! available on demand through `PhysicsWorld::active_contacts`.

use crossbeam_channel::Receiver;
use glam::Vec3;
use rapier3d::geometry::ContactPair;
use rapier3d::prelude::{
    ColliderHandle, ColliderSet, CollisionEvent, NarrowPhase, PairFilterContext, PhysicsHooks,
    RigidBodySet, SolverFlags,
};

use super::body::BodyId;
use crate::math::{from_na, from_na_point};

/// Transient record of two bodies coming into contact.
///
/// Delivered by value each tick; nothing is persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub body_a: BodyId,
    pub owner_tag_a: u64,
    pub point_a: Vec3,
    pub body_b: BodyId,
    pub owner_tag_b: u64,
    pub point_b: Vec3,
}

/// One-shot iterator over contacts started since the last drain.
///
/// Not restartable: events consumed here are gone.
pub struct ContactEvents<'a> {
    pub(crate) receiver: &'a Receiver<CollisionEvent>,
    pub(crate) bodies: &'a RigidBodySet,
    pub(crate) colliders: &'a ColliderSet,
    pub(crate) narrow_phase: &'a NarrowPhase,
}

impl<'a> Iterator for ContactEvents<'a> {
    type Item = ContactEvent;

    fn next(&mut self) -> Option<ContactEvent> {
        loop {
            let event = self.receiver.try_recv().ok()?;
            if let CollisionEvent::Started(c1, c2, _) = event {
                if let Some(event) =
                    contact_event(self.bodies, self.colliders, self.narrow_phase, c1, c2)
                {
                    return Some(event);
                }
            }
        }
    }
}

/// Build a `ContactEvent` for a collider pair, if both sides still resolve
/// to live bodies.
pub(crate) fn contact_event(
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
    narrow_phase: &NarrowPhase,
    c1: ColliderHandle,
    c2: ColliderHandle,
) -> Option<ContactEvent> {
    let collider_a = colliders.get(c1)?;
    let collider_b = colliders.get(c2)?;
    let handle_a = collider_a.parent()?;
    let handle_b = collider_b.parent()?;
    let body_a = bodies.get(handle_a)?;
    let body_b = bodies.get(handle_b)?;

    // First manifold point where available; sensor overlaps have no
    // manifold, so fall back to the collider origins.
    let mut point_a = from_na(&collider_a.position().translation.vector);
    let mut point_b = from_na(&collider_b.position().translation.vector);
    if let Some(pair) = narrow_phase.contact_pair(c1, c2) {
        if let Some(manifold) = pair.manifolds.iter().find(|m| !m.points.is_empty()) {
            let contact = &manifold.points[0];
            let (local_a, local_b) = if pair.collider1 == c1 {
                (&contact.local_p1, &contact.local_p2)
            } else {
                (&contact.local_p2, &contact.local_p1)
            };
            point_a = from_na_point(&collider_a.position().transform_point(local_a));
            point_b = from_na_point(&collider_b.position().transform_point(local_b));
        }
    }

    Some(ContactEvent {
        body_a: BodyId(handle_a),
        owner_tag_a: body_a.user_data as u64,
        point_a,
        body_b: BodyId(handle_b),
        owner_tag_b: body_b.user_data as u64,
        point_b,
    })
}

pub(crate) fn pair_event(
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
    narrow_phase: &NarrowPhase,
    pair: &ContactPair,
) -> Option<ContactEvent> {
    contact_event(bodies, colliders, narrow_phase, pair.collider1, pair.collider2)
}

/// Physics hook rejecting contacts between bodies that share a nonzero
/// owner tag.
///
/// A tag of zero means "untagged" and never suppresses contacts.
pub(crate) struct OwnerTagFilter;

impl OwnerTagFilter {
    fn same_owner(context: &PairFilterContext) -> bool {
        let (Some(h1), Some(h2)) = (context.rigid_body1, context.rigid_body2) else {
            return false;
        };
        match (context.bodies.get(h1), context.bodies.get(h2)) {
            (Some(a), Some(b)) => a.user_data != 0 && a.user_data == b.user_data,
            _ => false,
        }
    }
}

impl PhysicsHooks for OwnerTagFilter {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        if Self::same_owner(context) {
            None
        } else {
            Some(SolverFlags::COMPUTE_IMPULSES)
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        !Self::same_owner(context)
    }
}
