// Body state snapshot/restore integration tests
//
// Covers round-trip idempotence, the static-body velocity rule, the body
// budget, and stale-handle behavior.

use glam::Vec3;
use granite_engine::{BodyState, EngineError, PhysicsConfig, PhysicsWorld};

const DT: f32 = 1.0 / 60.0;

fn world_with_gravity() -> PhysicsWorld {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).expect("world construction");
    world.set_gravity(Vec3::new(0.0, 0.0, -9.81));
    world
}

fn assert_states_close(a: &BodyState, b: &BodyState) {
    assert!((a.position - b.position).length() < 1e-4, "position drifted");
    assert!(a.rotation.dot(b.rotation).abs() > 1.0 - 1e-5, "rotation drifted");
    assert!(
        (a.linear_velocity - b.linear_velocity).length() < 1e-4,
        "linear velocity drifted"
    );
    assert!(
        (a.angular_velocity - b.angular_velocity).length() < 1e-4,
        "angular velocity drifted"
    );
    assert_eq!(a.gravity_factor, b.gravity_factor);
    assert_eq!(a.is_sensor, b.is_sensor);
    assert_eq!(a.is_active, b.is_active);
    assert_eq!(a.layer, b.layer);
}

#[test]
fn restoring_a_fresh_snapshot_is_a_no_op() {
    let mut world = world_with_gravity();

    let floor = BodyState {
        position: Vec3::new(0.0, 0.0, -0.5),
        ..Default::default()
    };
    world
        .add_static_box(Vec3::new(10.0, 10.0, 0.5), 1, &floor)
        .expect("floor");

    let falling = BodyState {
        position: Vec3::new(0.0, 0.0, 3.0),
        ..Default::default()
    };
    let body = world
        .add_dynamic_box(Vec3::splat(0.5), 1000.0, 10.0, 2, &falling)
        .expect("box");

    // Let it pick up velocity so the snapshot is nontrivial.
    for _ in 0..30 {
        world.update(DT, 1);
    }

    let before = world.body_state(body).expect("snapshot");
    assert!(before.linear_velocity.z < -0.5, "body should be falling");

    world.set_body_state(body, &before).expect("restore");
    let after = world.body_state(body).expect("second snapshot");
    assert_states_close(&before, &after);
}

#[test]
fn static_bodies_reject_velocity_writes() {
    let mut world = world_with_gravity();

    let state = BodyState::default();
    let body = world
        .add_static_box(Vec3::new(2.0, 2.0, 0.5), 1, &state)
        .expect("static box");

    let mut pushed = world.body_state(body).expect("snapshot");
    pushed.linear_velocity = Vec3::new(5.0, 0.0, 1.0);
    pushed.angular_velocity = Vec3::new(0.0, 3.0, 0.0);
    world.set_body_state(body, &pushed).expect("restore");

    let (linear, angular) = world.velocity(body).expect("velocity");
    assert_eq!(linear, Vec3::ZERO);
    assert_eq!(angular, Vec3::ZERO);

    world
        .set_velocity_and_activate(body, Vec3::new(1.0, 1.0, 1.0), Vec3::ZERO)
        .expect("velocity write");
    let (linear, _) = world.velocity(body).expect("velocity");
    assert_eq!(linear, Vec3::ZERO);
}

#[test]
fn body_budget_exhaustion_is_reported() {
    let config = PhysicsConfig {
        max_bodies: 2,
        ..Default::default()
    };
    let mut world = PhysicsWorld::new(config).expect("world construction");

    let state = BodyState::default();
    world
        .add_dynamic_sphere(0.5, 1000.0, 1.0, 1, &state)
        .expect("first body");
    world
        .add_dynamic_sphere(0.5, 1000.0, 1.0, 2, &state)
        .expect("second body");

    let overflow = world.add_dynamic_sphere(0.5, 1000.0, 1.0, 3, &state);
    assert!(matches!(
        overflow,
        Err(EngineError::ResourceExhausted { resource: "bodies", limit: 2 })
    ));
    assert_eq!(world.body_count(), 2);
}

#[test]
fn stale_ids_error_after_removal() {
    let mut world = world_with_gravity();
    let body = world
        .add_dynamic_sphere(0.5, 1000.0, 1.0, 1, &BodyState::default())
        .expect("sphere");

    world.remove_body(body).expect("remove");

    assert!(matches!(
        world.body_state(body),
        Err(EngineError::InvalidHandle { kind: "body" })
    ));
    assert!(world.remove_body(body).is_err());
    assert!(world.set_velocity(body, Vec3::X, Vec3::ZERO).is_err());
}

#[test]
fn activation_flag_round_trips_through_snapshots() {
    let mut world = world_with_gravity();

    let asleep = BodyState {
        position: Vec3::new(0.0, 0.0, 1.0),
        is_active: false,
        ..Default::default()
    };
    let body = world
        .add_dynamic_box(Vec3::splat(0.5), 1000.0, 1.0, 1, &asleep)
        .expect("box");
    assert!(!world.is_body_active(body).expect("activity"));

    // Restoring the unchanged snapshot must not wake the body.
    let snapshot = world.body_state(body).expect("snapshot");
    assert!(!snapshot.is_active);
    world.set_body_state(body, &snapshot).expect("restore");
    assert!(!world.is_body_active(body).expect("activity"));

    let mut awake = snapshot;
    awake.is_active = true;
    world.set_body_state(body, &awake).expect("restore awake");
    assert!(world.is_body_active(body).expect("activity"));
}

#[test]
fn sensor_and_layer_changes_apply_through_snapshots() {
    let mut world = world_with_gravity();
    let body = world
        .add_dynamic_box(Vec3::splat(0.5), 1000.0, 1.0, 1, &BodyState::default())
        .expect("box");

    let mut state = world.body_state(body).expect("snapshot");
    assert!(!state.is_sensor);
    assert_eq!(state.layer, 0);

    state.is_sensor = true;
    state.layer = 3;
    world.set_body_state(body, &state).expect("restore");

    let after = world.body_state(body).expect("snapshot");
    assert!(after.is_sensor);
    assert_eq!(after.layer, 3);
}

#[test]
fn out_of_range_layers_are_rejected() {
    let mut world = world_with_gravity();
    let body = world
        .add_dynamic_box(Vec3::splat(0.5), 1000.0, 1.0, 1, &BodyState::default())
        .expect("box");

    let mut state = world.body_state(body).expect("snapshot");
    state.layer = 200;
    assert!(matches!(
        world.set_body_state(body, &state),
        Err(EngineError::InvalidLayer { layer: 200, .. })
    ));
}
