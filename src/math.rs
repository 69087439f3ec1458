//! Conversions between the public `glam` math types and the `nalgebra`
//! types the physics engine works in.
//!
//! Everything caller-facing speaks `glam`; `nalgebra` never leaks past the
//! physics module boundary.

use glam::{Mat4, Quat, Vec3};
use nalgebra as na;
use rapier3d::math::{Isometry, Point, Real, Vector};

pub(crate) fn to_na(v: Vec3) -> Vector<Real> {
    na::Vector3::new(v.x, v.y, v.z)
}

pub(crate) fn from_na(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_na_point(v: Vec3) -> Point<Real> {
    na::Point3::new(v.x, v.y, v.z)
}

pub(crate) fn from_na_point(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

pub(crate) fn to_na_quat(q: Quat) -> na::UnitQuaternion<Real> {
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn from_na_quat(q: &na::UnitQuaternion<Real>) -> Quat {
    // nalgebra stores the vector part first, the scalar last.
    let coords = q.coords;
    Quat::from_xyzw(coords.x, coords.y, coords.z, coords.w)
}

/// Build an engine isometry from a position and rotation pair.
pub(crate) fn to_iso(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(na::Translation3::new(position.x, position.y, position.z), to_na_quat(rotation))
}

pub(crate) fn from_iso(iso: &Isometry<Real>) -> (Vec3, Quat) {
    (from_na(&iso.translation.vector), from_na_quat(&iso.rotation))
}

/// Column-major world transform from a position and rotation pair.
pub(crate) fn transform_matrix(position: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_rotation_translation(rotation, position)
}
