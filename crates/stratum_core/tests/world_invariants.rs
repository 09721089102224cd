//! # World Invariant Tests
//!
//! End-to-end checks of the facade's guarantees:
//!
//! 1. **Signatures** track component presence exactly
//! 2. **Systems** hold exactly the entities whose signature covers theirs
//! 3. **Directory** naming is idempotent and cleaned up on destroy
//! 4. **Snapshots** restore component state additively
//! 5. **Capacity** ceilings fail loudly
//! 6. **Threads** can share one world without tearing its invariants
//!
//! Run with: cargo test -p stratum_core --test world_invariants

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratum_core::sync::Command;
use stratum_core::{
    CommandQueue, Coordinator, EcsError, EcsResult, Entity, EntityMut, EntityRecord, EntityRef,
    Signature, Snapshot, WorldConfig,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Camera {
    zoom: f32,
}

#[derive(Default)]
struct MovementSystem;

#[derive(Default)]
struct RenderSystem;

#[derive(Default)]
struct CameraSystem;

fn world(max_entities: usize) -> Coordinator {
    let world = Coordinator::new(WorldConfig::with_max_entities(max_entities)).unwrap();
    world.register_component::<Position>().unwrap();
    world.register_component::<Velocity>().unwrap();
    world.register_component::<Camera>().unwrap();
    world
}

fn signature_of(tags: &[u8]) -> Signature {
    tags.iter().copied().collect()
}

/// Every live entity whose signature covers `required`.
fn expected_members(world: &Coordinator, required: Signature) -> Vec<Entity> {
    let mut members: Vec<Entity> = world
        .entity_ids()
        .into_values()
        .filter(|&e| world.entity_signature(e).unwrap().contains(required))
        .collect();
    members.sort();
    members
}

fn serialize(record: &mut EntityRecord, entity: EntityRef<'_>) -> EcsResult<()> {
    if let Ok(position) = entity.get::<Position>() {
        record.insert("position", position)?;
    }
    if let Ok(velocity) = entity.get::<Velocity>() {
        record.insert("velocity", velocity)?;
    }
    Ok(())
}

fn deserialize(record: &EntityRecord, mut entity: EntityMut<'_>) -> EcsResult<()> {
    if let Some(position) = record.get::<Position>("position")? {
        entity.insert(position)?;
    }
    if let Some(velocity) = record.get::<Velocity>("velocity")? {
        entity.insert(velocity)?;
    }
    Ok(())
}

// ============================================================================
// SIGNATURES
// ============================================================================

#[test]
fn has_component_iff_signature_bit_set() {
    let world = world(64);
    let position = world.component_type::<Position>().unwrap();
    let velocity = world.component_type::<Velocity>().unwrap();

    let entities: Vec<Entity> = (0..10).map(|_| world.create_entity().unwrap()).collect();
    for (i, &e) in entities.iter().enumerate() {
        if i % 2 == 0 {
            world.add_component(e, Position::default()).unwrap();
        }
        if i % 3 == 0 {
            world.add_component(e, Velocity::default()).unwrap();
        }
        if i % 4 == 0 {
            world.remove_component::<Position>(e).unwrap();
        }
    }

    for &e in &entities {
        let signature = world.entity_signature(e).unwrap();
        assert_eq!(world.has_component::<Position>(e), signature.test(position));
        assert_eq!(world.has_component::<Velocity>(e), signature.test(velocity));
    }
}

#[test]
fn add_then_remove_clears_bit_and_second_remove_is_harmless() {
    let world = world(8);
    let tag = world.component_type::<Position>().unwrap();
    let e = world.create_entity().unwrap();

    world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
    assert_eq!(world.remove_component::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0 });
    assert!(!world.has_component::<Position>(e));
    assert!(!world.entity_signature(e).unwrap().test(tag));

    let before = world.entity_signature(e).unwrap();
    assert!(matches!(
        world.remove_component::<Position>(e),
        Err(EcsError::ComponentMissing { .. })
    ));
    assert_eq!(world.entity_signature(e).unwrap(), before);
    assert!(world.entities_with_component::<Position>().is_empty());
}

#[test]
fn tags_are_stable_and_registration_idempotent() {
    let world = world(8);
    assert_eq!(world.component_type::<Position>().unwrap(), 0);
    assert_eq!(world.component_type::<Velocity>().unwrap(), 1);
    assert_eq!(world.register_component::<Position>().unwrap(), 0);
    assert_eq!(world.component_type_count(), 3);
    assert_eq!(world.component_type_name(2), Some("Camera"));
}

// ============================================================================
// SYSTEMS
// ============================================================================

#[test]
fn system_sets_match_superset_rule_after_mixed_operations() {
    let world = world(64);
    let movement = world.register_system::<MovementSystem>().unwrap();
    let render = world.register_system::<RenderSystem>().unwrap();

    let movement_sig = signature_of(&[0, 1]);
    let render_sig = signature_of(&[0]);
    world.set_system_signature::<MovementSystem>(movement_sig).unwrap();
    world.set_system_signature::<RenderSystem>(render_sig).unwrap();

    for i in 0..40u32 {
        let e = world.create_entity().unwrap();
        if i % 2 == 0 {
            world.add_component(e, Position::default()).unwrap();
        }
        if i % 3 == 0 {
            world.add_component(e, Velocity::default()).unwrap();
        }
        if i % 5 == 0 {
            let _ = world.remove_component::<Position>(e);
        }
        if i % 7 == 0 {
            world.destroy_entity(e).unwrap();
        }
    }

    assert_eq!(movement.entities(), expected_members(&world, movement_sig));
    assert_eq!(render.entities(), expected_members(&world, render_sig));
    // An entity with both is in both systems
    let both: BTreeSet<_> = movement.entities().into_iter().collect();
    assert!(both.iter().all(|e| render.contains(*e)));
}

#[test]
fn setting_signature_late_reevaluates_existing_entities() {
    let world = world(16);
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.add_component(a, Camera { zoom: 1.0 }).unwrap();
    world.add_component(b, Position::default()).unwrap();

    let cameras = world.register_system::<CameraSystem>().unwrap();
    assert!(cameras.is_empty());

    let camera_sig = signature_of(&[world.component_type::<Camera>().unwrap()]);
    world.set_system_signature::<CameraSystem>(camera_sig).unwrap();
    assert_eq!(cameras.entities(), vec![a]);
    assert_eq!(world.system_signature::<CameraSystem>().unwrap(), Some(camera_sig));
}

#[test]
fn empty_requirement_tracks_every_live_entity() {
    let world = world(16);
    let all = world.register_system::<RenderSystem>().unwrap();
    world.set_system_signature::<RenderSystem>(Signature::EMPTY).unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_named_entity("B").unwrap();
    assert_eq!(all.entities(), vec![a, b]);

    world.destroy_entity(a).unwrap();
    assert_eq!(all.entities(), vec![b]);
}

#[test]
fn unregistered_system_signature_fails() {
    let world = world(4);
    assert_eq!(
        world.set_system_signature::<CameraSystem>(Signature::EMPTY),
        Err(EcsError::SystemNotRegistered { type_name: "CameraSystem" })
    );
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[test]
fn named_creation_is_idempotent() {
    let world = world(8);
    let first = world.create_named_entity("X").unwrap();
    let second = world.create_named_entity("X").unwrap();

    assert_eq!(first, second);
    let ids = world.entity_ids();
    assert_eq!(ids.iter().filter(|(name, _)| name.as_str() == "X").count(), 1);
    assert_eq!(world.live_entity_count(), 1);
}

#[test]
fn destroy_cleans_systems_directory_and_components() {
    let world = world(8);
    let movement = world.register_system::<MovementSystem>().unwrap();
    world
        .set_system_signature::<MovementSystem>(signature_of(&[0, 1]))
        .unwrap();

    let e = world.create_named_entity("MOVER").unwrap();
    world.add_component(e, Position::default()).unwrap();
    world.add_component(e, Velocity::default()).unwrap();
    assert!(movement.contains(e));

    world.destroy_entity(e).unwrap();

    assert!(!movement.contains(e));
    assert_eq!(world.entity_by_name("MOVER"), None);
    assert_eq!(world.entity_key(e), "");
    assert!(!world.has_component::<Position>(e));
    assert_eq!(
        world.get_component::<Position>(e).err(),
        Some(EcsError::EntityNotAlive(e))
    );
    assert_eq!(world.destroy_entity(e), Err(EcsError::EntityNotAlive(e)));
}

#[test]
fn recycled_id_starts_clean() {
    let world = world(1);
    let e = world.create_named_entity("OLD").unwrap();
    world.add_component(e, Position { x: 5.0, y: 5.0 }).unwrap();
    world.destroy_entity(e).unwrap();

    let fresh = world.create_named_entity("NEW").unwrap();
    assert_eq!(fresh, e);
    assert!(!world.has_component::<Position>(fresh));
    assert!(world.entity_signature(fresh).unwrap().is_empty());
    assert_eq!(world.entity_key(fresh), "NEW");
}

#[test]
fn prefix_query_is_anchored() {
    let world = world(8);
    let main = world.create_named_entity("CAM_MAIN").unwrap();
    let debug = world.create_named_entity("CAM_DEBUG").unwrap();
    world.create_named_entity("CHAR_1").unwrap();
    world.create_named_entity("SCAM").unwrap();

    let mut found = world.entities_with_prefix("CAM");
    found.sort();
    let mut expected = vec![main, debug];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn entities_with_component_lists_exact_owners() {
    let world = world(8);
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.create_entity().unwrap();
    world.add_component(a, Camera::default()).unwrap();
    world.add_component(b, Camera::default()).unwrap();

    let mut owners = world.entities_with_component::<Camera>();
    owners.sort();
    assert_eq!(owners, vec![a, b]);
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

#[test]
fn backup_then_restore_rolls_component_back() {
    let world = world(8);
    let p = world.create_named_entity("P").unwrap();
    world.add_component(p, Position { x: 10.0, y: 20.0 }).unwrap();

    assert_eq!(world.backup(serialize).unwrap(), 1);

    world
        .with_component_mut::<Position, _>(p, |position| {
            position.x = 99.0;
            position.y = 99.0;
        })
        .unwrap();

    assert_eq!(world.restore(deserialize).unwrap(), 1);
    assert_eq!(
        world.component_cloned::<Position>(p).unwrap(),
        Position { x: 10.0, y: 20.0 }
    );
}

#[test]
fn restore_is_additive() {
    let world = world(8);
    let p = world.create_named_entity("P").unwrap();
    world.add_component(p, Position { x: 1.0, y: 1.0 }).unwrap();
    let gone = world.create_named_entity("GONE").unwrap();
    world.add_component(gone, Velocity { dx: 3.0, dy: 0.0 }).unwrap();
    world.backup(serialize).unwrap();

    // Destroyed entities come back; newcomers are left alone
    world.destroy_entity(gone).unwrap();
    let late = world.create_named_entity("LATE").unwrap();
    world.add_component(late, Position { x: 7.0, y: 7.0 }).unwrap();

    world.restore(deserialize).unwrap();

    let revived = world.entity_by_name("GONE").unwrap();
    assert_eq!(
        world.component_cloned::<Velocity>(revived).unwrap(),
        Velocity { dx: 3.0, dy: 0.0 }
    );
    assert_eq!(world.entity_by_name("LATE"), Some(late));
    assert_eq!(
        world.component_cloned::<Position>(late).unwrap(),
        Position { x: 7.0, y: 7.0 }
    );
    assert_eq!(world.entity_by_name("P"), Some(p));
    assert_eq!(world.live_entity_count(), 3);
}

#[test]
fn restore_keeps_the_store_and_records_carry_id_and_name() {
    let world = world(8);
    let p = world.create_named_entity("P").unwrap();
    world.add_component(p, Position { x: 1.0, y: 2.0 }).unwrap();
    world.backup(serialize).unwrap();

    world.restore(deserialize).unwrap();
    let snapshot = world.snapshot();
    assert_eq!(snapshot.len(), 1);

    let record = snapshot.find("P").unwrap();
    assert_eq!(record.entity, p);
    assert_eq!(record.name, "P");
    assert!(record.contains("position"));
    assert!(!record.contains("velocity"));
}

#[test]
fn failed_backup_keeps_previous_snapshot() {
    let world = world(8);
    world.create_named_entity("A").unwrap();
    world.backup(|_, _| Ok(())).unwrap();

    let result = world.backup(|_, _| Err(EcsError::SnapshotFormat("disk full".into())));
    assert!(result.is_err());
    assert_eq!(world.snapshot().len(), 1);
}

#[test]
fn snapshot_survives_json_and_loads_into_another_world() {
    let source = world(8);
    let p = source.create_named_entity("P").unwrap();
    source.add_component(p, Position { x: 4.0, y: 2.0 }).unwrap();
    source.backup(serialize).unwrap();
    let text = source.snapshot().to_json().unwrap();

    let target = world(8);
    target.load_snapshot(Snapshot::from_json(&text).unwrap());
    target.restore(deserialize).unwrap();

    let restored = target.entity_by_name("P").unwrap();
    assert_eq!(
        target.component_cloned::<Position>(restored).unwrap(),
        Position { x: 4.0, y: 2.0 }
    );
}

#[test]
fn restore_entity_overwrites_live_name() {
    let world = world(8);
    let p = world.create_named_entity("P").unwrap();
    world.add_component(p, Position { x: 0.0, y: 0.0 }).unwrap();

    let mut record = EntityRecord::new(Entity::from_raw(5), "P");
    record.insert("position", &Position { x: 8.0, y: 9.0 }).unwrap();

    let restored = world.restore_entity(&record, deserialize).unwrap();
    assert_eq!(restored, p);
    assert_eq!(world.live_entity_count(), 1);
    assert_eq!(world.component_cloned::<Position>(p).unwrap(), Position { x: 8.0, y: 9.0 });
}

// ============================================================================
// CAPACITY
// ============================================================================

#[test]
fn creating_past_capacity_fails_without_clobbering() {
    const CAPACITY: usize = 16;
    let world = world(CAPACITY);

    let mut seen = BTreeSet::new();
    for i in 0..CAPACITY {
        let e = world.create_named_entity(&format!("E{i}")).unwrap();
        assert!(seen.insert(e), "id {e} handed out twice");
    }

    assert_eq!(
        world.create_entity(),
        Err(EcsError::EntityCapacityExceeded { capacity: CAPACITY })
    );
    assert_eq!(
        world.create_named_entity("ONE_MORE"),
        Err(EcsError::EntityCapacityExceeded { capacity: CAPACITY })
    );
    assert_eq!(world.live_entity_count(), CAPACITY);
    assert_eq!(world.entity_ids().len(), CAPACITY);

    // Existing names still resolve to their original ids
    assert_eq!(world.create_named_entity("E0").unwrap(), world.entity_by_name("E0").unwrap());
}

#[test]
fn component_type_capacity() {
    let world = Coordinator::new(WorldConfig {
        max_components: 2,
        ..WorldConfig::default()
    })
    .unwrap();
    world.register_component::<Position>().unwrap();
    world.register_component::<Velocity>().unwrap();

    assert_eq!(
        world.register_component::<Camera>(),
        Err(EcsError::ComponentCapacityExceeded { capacity: 2 })
    );
    assert!(world.component_type::<Camera>().is_err());
}

// ============================================================================
// THREADS
// ============================================================================

#[test]
fn live_component_guard_holds_off_swap_removal() {
    let world = Arc::new(world(16));
    let first = world.create_named_entity("FIRST").unwrap();
    let middle = world.create_named_entity("MIDDLE").unwrap();
    let last = world.create_named_entity("LAST").unwrap();
    world.add_component(first, Position { x: 1.0, y: 1.0 }).unwrap();
    world.add_component(middle, Position { x: 2.0, y: 2.0 }).unwrap();
    world.add_component(last, Position { x: 3.0, y: 3.0 }).unwrap();

    // Removing FIRST swaps LAST, the guarded value, into its dense slot
    let guard = world.get_component::<Position>(last).unwrap();
    let removed = Arc::new(AtomicBool::new(false));
    let remover = {
        let world = Arc::clone(&world);
        let removed = Arc::clone(&removed);
        std::thread::spawn(move || {
            let value = world.remove_component::<Position>(first).unwrap();
            removed.store(true, Ordering::SeqCst);
            value
        })
    };

    std::thread::sleep(Duration::from_millis(50));
    assert!(!removed.load(Ordering::SeqCst));
    assert_eq!(*guard, Position { x: 3.0, y: 3.0 });
    drop(guard);

    assert_eq!(remover.join().unwrap(), Position { x: 1.0, y: 1.0 });
    assert!(removed.load(Ordering::SeqCst));
    assert_eq!(world.entities_with_component::<Position>(), vec![last, middle]);
    assert_eq!(
        *world.get_component::<Position>(last).unwrap(),
        Position { x: 3.0, y: 3.0 }
    );
    assert_eq!(
        *world.get_component::<Position>(middle).unwrap(),
        Position { x: 2.0, y: 2.0 }
    );
}

#[test]
fn live_mutable_guard_holds_off_component_add() {
    let world = Arc::new(world(16));
    let anchor = world.create_named_entity("ANCHOR").unwrap();
    let joiner = world.create_named_entity("JOINER").unwrap();
    world.add_component(anchor, Position::default()).unwrap();

    let mut guard = world.get_component_mut::<Position>(anchor).unwrap();
    let added = Arc::new(AtomicBool::new(false));
    let adder = {
        let world = Arc::clone(&world);
        let added = Arc::clone(&added);
        std::thread::spawn(move || {
            world.add_component(joiner, Position { x: 9.0, y: 9.0 }).unwrap();
            added.store(true, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(50));
    assert!(!added.load(Ordering::SeqCst));
    guard.x = 5.0;
    drop(guard);

    adder.join().unwrap();
    assert_eq!(world.component_cloned::<Position>(anchor).unwrap().x, 5.0);
    assert_eq!(world.component_cloned::<Position>(joiner).unwrap().x, 9.0);
}

#[test]
fn network_thread_and_frame_loop_share_one_world() {
    let world = Arc::new(world(512));
    let movement = world.register_system::<MovementSystem>().unwrap();
    world
        .set_system_signature::<MovementSystem>(signature_of(&[0, 1]))
        .unwrap();

    let queue = CommandQueue::new(1024);
    let sender = queue.sender();

    // Direct structural changes from one thread, deferred from another
    let direct = {
        let world = Arc::clone(&world);
        std::thread::spawn(move || {
            for i in 0..100 {
                let e = world.create_named_entity(&format!("DIRECT_{i}")).unwrap();
                world.add_component(e, Position::default()).unwrap();
                world.add_component(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
                if i % 2 == 0 {
                    world.remove_component::<Velocity>(e).unwrap();
                }
            }
        })
    };
    let deferred = std::thread::spawn(move || {
        for i in 0..100 {
            let name = format!("REMOTE_{i}");
            assert!(sender.send_blocking(Command::create_named(name.as_str())));
            assert!(sender.send_blocking(Command::insert(name.as_str(), Position::default())));
            assert!(sender.send_blocking(Command::insert(name.as_str(), Velocity { dx: 0.0, dy: 1.0 })));
        }
    });

    // Frame loop: apply queued commands, then integrate movement
    for _ in 0..50 {
        world.apply_commands(&queue);
        movement.run(|_, entities| {
            for &e in entities {
                let Ok(velocity) = world.component_cloned::<Velocity>(e) else {
                    continue;
                };
                let _ = world.with_component_mut::<Position, _>(e, |p| {
                    p.x += velocity.dx;
                    p.y += velocity.dy;
                });
            }
        });
    }

    direct.join().unwrap();
    deferred.join().unwrap();
    world.apply_commands(&queue);

    let required = signature_of(&[0, 1]);
    assert_eq!(movement.entities(), expected_members(&world, required));
    assert_eq!(movement.len(), 50 + 100);
    assert_eq!(world.live_entity_count(), 200);
}
