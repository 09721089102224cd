//! # Game Systems
//!
//! Per-frame logic. Each system is driven through
//! [`SystemHandle::run`](stratum_core::SystemHandle::run), which hands it the
//! entities that currently match its signature. Component access goes
//! through the coordinator's scoped closures so no lock guard is held
//! between entities.

use std::sync::Arc;

use stratum_core::{Coordinator, EcsError, EcsResult, Entity, Signature, SystemHandle};

use crate::components::{Camera, Gravity, Kinematic, Transform};

/// Registers every driver system and sets its signature.
///
/// # Errors
///
/// [`EcsError::ComponentNotRegistered`] if a component was not registered
/// first.
pub fn register(world: &Coordinator) -> EcsResult<Systems> {
    let transform = world.component_type::<Transform>()?;
    let kinematic = world.component_type::<Kinematic>()?;
    let gravity = world.component_type::<Gravity>()?;
    let camera = world.component_type::<Camera>()?;

    let systems = Systems {
        gravity: world.register_system::<GravitySystem>()?,
        kinematic: world.register_system::<KinematicSystem>()?,
        camera: world.register_system::<CameraSystem>()?,
    };

    world.set_system_signature::<GravitySystem>(Signature::EMPTY.with(transform).with(gravity))?;
    world.set_system_signature::<KinematicSystem>(Signature::EMPTY.with(transform).with(kinematic))?;
    world.set_system_signature::<CameraSystem>(Signature::EMPTY.with(camera))?;

    Ok(systems)
}

/// Handles to the registered systems.
pub struct Systems {
    /// Pulls entities along their gravity vector.
    pub gravity: Arc<SystemHandle<GravitySystem>>,
    /// Integrates velocity and acceleration.
    pub kinematic: Arc<SystemHandle<KinematicSystem>>,
    /// Keeps the main camera on its target.
    pub camera: Arc<SystemHandle<CameraSystem>>,
}

impl Systems {
    /// Runs one frame of every system, in dependency order.
    ///
    /// # Errors
    ///
    /// The first component lookup that fails for a reason other than the
    /// entity having died mid-frame.
    pub fn update(&self, world: &Coordinator, dt: f32) -> EcsResult<()> {
        self.gravity.run(|system, entities| system.update(world, entities, dt))?;
        self.kinematic.run(|system, entities| system.update(world, entities, dt))?;
        self.camera.run(|system, entities| system.update(world, entities))
    }
}

/// Entities can be destroyed by the frame owner between the system copying
/// its entity list and reaching them; those are skipped.
fn skip_dead<T>(result: EcsResult<T>) -> EcsResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EcsError::EntityNotAlive(_) | EcsError::ComponentMissing { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Moves `Transform + Gravity` entities by their gravity each frame.
#[derive(Debug, Default)]
pub struct GravitySystem {
    /// Total entity-updates performed.
    pub updates: u64,
}

impl GravitySystem {
    fn update(&mut self, world: &Coordinator, entities: &[Entity], dt: f32) -> EcsResult<()> {
        for &entity in entities {
            let Some(gravity) = skip_dead(world.component_cloned::<Gravity>(entity))? else {
                continue;
            };
            let moved = skip_dead(world.with_component_mut::<Transform, _>(entity, |t| {
                t.x += gravity.x * dt;
                t.y += gravity.y * dt;
            }))?;
            if moved.is_some() {
                self.updates += 1;
            }
        }
        Ok(())
    }
}

/// Integrates `Transform + Kinematic` entities (semi-implicit Euler).
#[derive(Debug, Default)]
pub struct KinematicSystem {
    /// Total entity-updates performed.
    pub updates: u64,
}

impl KinematicSystem {
    fn update(&mut self, world: &Coordinator, entities: &[Entity], dt: f32) -> EcsResult<()> {
        for &entity in entities {
            let Some(kinematic) = skip_dead(world.with_component_mut::<Kinematic, _>(entity, |k| {
                k.vx += k.ax * dt;
                k.vy += k.ay * dt;
                *k
            }))?
            else {
                continue;
            };
            let moved = skip_dead(world.with_component_mut::<Transform, _>(entity, |t| {
                t.x += kinematic.vx * dt;
                t.y += kinematic.vy * dt;
            }))?;
            if moved.is_some() {
                self.updates += 1;
            }
        }
        Ok(())
    }
}

/// Centers the main camera on the entity named by `target`.
#[derive(Debug, Default)]
pub struct CameraSystem {
    /// The camera being driven (first matching entity).
    pub main_camera: Option<Entity>,
    /// The followed entity.
    pub target: Option<Entity>,
}

impl CameraSystem {
    fn update(&mut self, world: &Coordinator, entities: &[Entity]) -> EcsResult<()> {
        if self.main_camera.map_or(true, |camera| !entities.contains(&camera)) {
            self.main_camera = entities.first().copied();
        }
        let (Some(camera), Some(target)) = (self.main_camera, self.target) else {
            return Ok(());
        };
        let Some((x, y)) = skip_dead(world.with_component::<Transform, _>(target, Transform::center))? else {
            return Ok(());
        };
        skip_dead(world.with_component_mut::<Camera, _>(camera, |c| {
            c.x = x;
            c.y = y;
        }))
        .map(drop)
    }
}
