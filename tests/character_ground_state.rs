// Character controller integration tests
//
// Scenario coverage for ground-state classification and the rigid-body
// character's floor snap.

use glam::Vec3;
use granite_engine::{
    BodyState, Character, CharacterSettings, CharacterUpdateSettings, CharacterVirtual,
    EngineError, GroundState, PhysicsConfig, PhysicsWorld,
};

const DT: f32 = 1.0 / 60.0;

fn world_with_gravity() -> PhysicsWorld {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).expect("world construction");
    world.set_gravity(Vec3::new(0.0, 0.0, -9.81));
    world
}

fn add_flat_floor(world: &mut PhysicsWorld) {
    let vertices = [
        Vec3::new(-10.0, -10.0, 0.0),
        Vec3::new(10.0, -10.0, 0.0),
        Vec3::new(10.0, 10.0, 0.0),
        Vec3::new(-10.0, 10.0, 0.0),
    ];
    let indices = [0u32, 1, 2, 0, 2, 3];
    world
        .add_static_mesh(&vertices, &indices, 1, &BodyState::default())
        .expect("floor mesh");
}

#[test]
fn character_resting_on_flat_mesh_reports_on_ground() {
    let mut world = world_with_gravity();
    add_flat_floor(&mut world);

    let mut character = CharacterVirtual::create(
        &mut world,
        &CharacterSettings::default(),
        Vec3::new(0.0, 0.0, 0.5),
    )
    .expect("character");

    let tick = CharacterUpdateSettings::default();
    for _ in 0..120 {
        world.update(DT, 1);
        character.update(&mut world, DT, &tick).expect("tick");
    }

    assert_eq!(character.ground_state(), GroundState::OnGround);
    assert!(character.ground_velocity().length() < 1e-3);
    assert!(
        character.position().z.abs() < 0.2,
        "character should rest at the mesh surface, was {:?}",
        character.position()
    );
    assert!(!character.is_slope_too_steep());

    character.destroy(&mut world).expect("destroy");
}

#[test]
fn character_in_free_fall_reports_in_air() {
    let mut world = world_with_gravity();

    let mut character = CharacterVirtual::create(
        &mut world,
        &CharacterSettings::default(),
        Vec3::new(0.0, 0.0, 10.0),
    )
    .expect("character");

    let tick = CharacterUpdateSettings::default();
    for _ in 0..10 {
        world.update(DT, 1);
        character.update(&mut world, DT, &tick).expect("tick");
    }

    assert_eq!(character.ground_state(), GroundState::InAir);
    assert!(
        character.linear_velocity().z < -0.5,
        "gravity should accumulate into the character's velocity"
    );
    assert!(character.position().z < 10.0);
    assert_eq!(character.ground_velocity(), Vec3::ZERO);
}

#[test]
fn refresh_contacts_reclassifies_without_moving() {
    let mut world = world_with_gravity();
    add_flat_floor(&mut world);

    let mut character = CharacterVirtual::create(
        &mut world,
        &CharacterSettings::default(),
        Vec3::new(0.0, 0.0, 0.0),
    )
    .expect("character");

    character.refresh_contacts(&mut world, 0).expect("refresh");
    assert_eq!(character.ground_state(), GroundState::OnGround);

    character.set_position(&mut world, Vec3::new(0.0, 0.0, 5.0));
    character.refresh_contacts(&mut world, 0).expect("refresh");
    assert_eq!(character.ground_state(), GroundState::InAir);
}

#[test]
fn rigid_body_character_settles_onto_the_floor() {
    let mut world = world_with_gravity();
    add_flat_floor(&mut world);

    let character = Character::create(
        &mut world,
        &CharacterSettings::default(),
        Vec3::new(0.0, 0.0, 1.0),
        11,
    )
    .expect("character");

    for _ in 0..180 {
        world.update(DT, 1);
        character.post_update(&mut world, 0.1).expect("post update");
    }

    assert!(character.is_on_ground(&mut world).expect("ground query"));
    let position = character.position(&world).expect("position");
    assert!(
        position.z.abs() < 0.1,
        "feet should sit at the surface, was {:?}",
        position
    );
    assert!(
        character
            .ground_velocity(&mut world)
            .expect("ground velocity")
            .length()
            < 1e-3
    );

    character.destroy(&mut world).expect("destroy");
}

#[test]
fn character_walking_into_a_dynamic_box_reports_the_contact() {
    let mut world = world_with_gravity();
    add_flat_floor(&mut world);

    let crate_id = world
        .add_dynamic_box(
            Vec3::splat(0.4),
            500.0,
            5.0,
            21,
            &BodyState {
                position: Vec3::new(1.5, 0.0, 0.4),
                ..Default::default()
            },
        )
        .expect("crate");

    let mut character = CharacterVirtual::create(
        &mut world,
        &CharacterSettings::default(),
        Vec3::new(0.0, 0.0, 0.1),
    )
    .expect("character");

    let tick = CharacterUpdateSettings::default();
    let mut touched = false;
    for _ in 0..240 {
        let mut velocity = character.linear_velocity();
        velocity.x = 1.5;
        velocity.y = 0.0;
        character.set_linear_velocity(velocity);

        world.update(DT, 1);
        character.update(&mut world, DT, &tick).expect("tick");
        if character.drain_dynamic_contacts().any(|id| id == crate_id) {
            touched = true;
            break;
        }
    }

    assert!(touched, "character never touched the crate");
}

#[test]
fn meshes_without_triangles_are_rejected() {
    let mut world = world_with_gravity();
    let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y];
    let result = world.add_static_mesh(&vertices, &[], 1, &BodyState::default());
    assert!(matches!(result, Err(EngineError::InvalidShape { .. })));
}
