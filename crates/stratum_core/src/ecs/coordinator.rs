//! # Coordinator
//!
//! The single synchronized entry point to the world. External code never
//! touches the allocator, component store or system registry directly.
//!
//! ## Locking discipline
//!
//! One reader-writer lock guards the whole world:
//! - create/destroy, component register/add/remove, system register and
//!   signature changes, backup/restore: **exclusive** for the full call
//! - component/type lookups and directory queries: **shared**
//!
//! Component references are lock guards ([`ComponentRef`], [`ComponentMut`]).
//! While one is alive no structural change can run, so a swap-removal can
//! never pull data out from under a reader. Do not hold a guard while calling
//! back into the same coordinator on the same thread; the lock is not
//! reentrant. The closure forms ([`Coordinator::with_component_mut`]) scope
//! the borrow for you.
//!
//! Background threads that should not contend with the frame can queue their
//! structural changes through a [`CommandSender`] instead and let the frame
//! owner apply them with [`Coordinator::apply_commands`].
//!
//! [`CommandSender`]: crate::sync::CommandSender

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use super::component::{Component, ComponentType};
use super::entity::Entity;
use super::signature::Signature;
use super::state::{EntityMut, EntityRef, WorldState};
use super::system::{System, SystemHandle};
use crate::config::WorldConfig;
#[cfg(doc)]
use crate::error::EcsError;
use crate::error::EcsResult;
use crate::snapshot::{EntityRecord, Snapshot};
use crate::sync::{ApplyReport, CommandQueue};

/// Shared borrow of one component, holding the world's read lock.
pub type ComponentRef<'a, C> = MappedRwLockReadGuard<'a, C>;

/// Exclusive borrow of one component, holding the world's write lock.
pub type ComponentMut<'a, C> = MappedRwLockWriteGuard<'a, C>;

/// The world facade.
///
/// Construct one per world and share it with `Arc` between the simulation
/// thread and any background threads.
///
/// # Example
///
/// ```rust
/// use stratum_core::{Coordinator, Signature, WorldConfig};
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// struct Transform {
///     x: f32,
///     y: f32,
/// }
///
/// let world = Coordinator::new(WorldConfig::default()).unwrap();
/// world.register_component::<Transform>().unwrap();
///
/// let player = world.create_named_entity("CHAR").unwrap();
/// world.add_component(player, Transform { x: 1.0, y: 2.0 }).unwrap();
///
/// world.with_component_mut::<Transform, _>(player, |t| t.x += 1.0).unwrap();
/// assert_eq!(world.get_component::<Transform>(player).unwrap().x, 2.0);
/// ```
pub struct Coordinator {
    state: RwLock<WorldState>,
    config: WorldConfig,
}

impl Coordinator {
    /// Creates an empty world.
    ///
    /// All entity slots and sparse indices are sized to
    /// `config.max_entities` up front.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(WorldState::new(&config)),
            config,
        })
    }

    /// Creates an empty world wrapped for sharing between threads.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration does not validate.
    pub fn shared(config: WorldConfig) -> EcsResult<Arc<Self>> {
        Self::new(config).map(Arc::new)
    }

    /// The configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity under a randomly generated key.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExceeded`] if the world is full.
    pub fn create_entity(&self) -> EcsResult<Entity> {
        self.state.write().create()
    }

    /// Returns the entity named `name`, creating it first if no live entity
    /// has that name.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExceeded`] if a new entity is needed and the
    /// world is full.
    pub fn create_named_entity(&self, name: &str) -> EcsResult<Entity> {
        self.state.write().create_named(name)
    }

    /// Destroys an entity: drops its components, removes it from every
    /// system and from the directory, and releases its id.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] if the entity is not live.
    pub fn destroy_entity(&self, entity: Entity) -> EcsResult<()> {
        self.state.write().destroy(entity)
    }

    /// Destroys the entity named `name`.
    ///
    /// Returns `false` (and does nothing) if no entity has that name.
    ///
    /// # Errors
    ///
    /// Propagates [`Coordinator::destroy_entity`] errors.
    pub fn destroy_named_entity(&self, name: &str) -> EcsResult<bool> {
        let mut state = self.state.write();
        match state.directory.get(name) {
            Some(entity) => state.destroy(entity).map(|()| true),
            None => Ok(false),
        }
    }

    /// Checks if an entity is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.state.read().entities.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_entity_count(&self) -> usize {
        self.state.read().entities.live_count()
    }

    /// A live entity's signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] if the entity is not live.
    pub fn entity_signature(&self, entity: Entity) -> EcsResult<Signature> {
        self.state.read().entities.signature(entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a component type, returning its tag. Idempotent.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentCapacityExceeded`] past `max_components` types.
    pub fn register_component<C: Component>(&self) -> EcsResult<ComponentType> {
        self.state.write().components.register::<C>()
    }

    /// The tag of a registered component type.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`] if `C` is unknown.
    pub fn component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.state.read().components.tag_of::<C>()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn component_type_count(&self) -> usize {
        self.state.read().components.type_count()
    }

    /// Name of the component type registered under `tag`.
    #[must_use]
    pub fn component_type_name(&self, tag: ComponentType) -> Option<&'static str> {
        self.state.read().components.type_name(tag)
    }

    /// Attaches a component.
    ///
    /// A duplicate add is silently skipped and reported as `Ok(false)`; the
    /// existing value is kept.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] or [`EcsError::ComponentNotRegistered`];
    /// nothing is modified in either case.
    pub fn add_component<C: Component>(&self, entity: Entity, value: C) -> EcsResult<bool> {
        self.state.write().add(entity, value)
    }

    /// Attaches a component, overwriting any existing value of that type.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] or [`EcsError::ComponentNotRegistered`].
    pub fn insert_component<C: Component>(&self, entity: Entity, value: C) -> EcsResult<()> {
        self.state.write().insert(entity, value)
    }

    /// Detaches a component and returns it.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if the entity does not have one; the
    /// signature and storage are left untouched.
    pub fn remove_component<C: Component>(&self, entity: Entity) -> EcsResult<C> {
        self.state.write().remove::<C>(entity)
    }

    /// Borrows a component under the shared lock.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`], [`EcsError::ComponentMissing`] or
    /// [`EcsError::ComponentNotRegistered`].
    pub fn get_component<C: Component>(&self, entity: Entity) -> EcsResult<ComponentRef<'_, C>> {
        RwLockReadGuard::try_map(self.state.read(), |state| state.get::<C>(entity).ok())
            .map_err(|state| state.lookup_error::<C>(entity))
    }

    /// Borrows a component mutably under the exclusive lock.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`], [`EcsError::ComponentMissing`] or
    /// [`EcsError::ComponentNotRegistered`].
    pub fn get_component_mut<C: Component>(&self, entity: Entity) -> EcsResult<ComponentMut<'_, C>> {
        RwLockWriteGuard::try_map(self.state.write(), |state| state.get_mut::<C>(entity).ok())
            .map_err(|state| state.lookup_error::<C>(entity))
    }

    /// Runs `f` on a component under the shared lock.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_component`].
    pub fn with_component<C: Component, R>(&self, entity: Entity, f: impl FnOnce(&C) -> R) -> EcsResult<R> {
        let state = self.state.read();
        state.get::<C>(entity).map(f)
    }

    /// Runs `f` on a component under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_component_mut`].
    pub fn with_component_mut<C: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut C) -> R,
    ) -> EcsResult<R> {
        let mut state = self.state.write();
        state.get_mut::<C>(entity).map(f)
    }

    /// Copies a component out.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_component`].
    pub fn component_cloned<C: Component + Clone>(&self, entity: Entity) -> EcsResult<C> {
        self.with_component(entity, C::clone)
    }

    /// Checks if an entity has a component. Never fails.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.state.read().components.has::<C>(entity)
    }

    /// Runs `f` over every `(entity, component)` of one type, densely packed,
    /// under a single exclusive lock. Returns how many were visited.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`] if `C` is unknown.
    pub fn for_each_component_mut<C: Component>(&self, mut f: impl FnMut(Entity, &mut C)) -> EcsResult<usize> {
        let mut state = self.state.write();
        let column = state.components.column_mut::<C>()?;
        let mut visited = 0;
        for (entity, value) in column.iter_mut() {
            f(entity, value);
            visited += 1;
        }
        Ok(visited)
    }

    /// All entities that currently have a `C`, in storage order.
    ///
    /// Unregistered types yield an empty list.
    #[must_use]
    pub fn entities_with_component<C: Component>(&self) -> Vec<Entity> {
        self.state
            .read()
            .components
            .column::<C>()
            .map(|column| column.entities().to_vec())
            .unwrap_or_default()
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a system type, or returns the existing instance.
    ///
    /// A new system matches nothing until its signature is set.
    ///
    /// # Errors
    ///
    /// Currently infallible; fallible for symmetry with component
    /// registration.
    pub fn register_system<S: System>(&self) -> EcsResult<Arc<SystemHandle<S>>> {
        Ok(self.state.write().systems.register::<S>())
    }

    /// Sets the components a system requires and re-evaluates every live
    /// entity against the new requirement.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`] if `S` is unknown.
    pub fn set_system_signature<S: System>(&self, signature: Signature) -> EcsResult<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state
            .systems
            .set_signature::<S>(signature, state.entities.live_signatures())
    }

    /// The signature a system requires, if set.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`] if `S` is unknown.
    pub fn system_signature<S: System>(&self) -> EcsResult<Option<Signature>> {
        self.state.read().systems.signature_of::<S>()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.state.read().systems.len()
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Copy of the name -> entity directory.
    #[must_use]
    pub fn entity_ids(&self) -> HashMap<String, Entity> {
        self.state.read().directory.to_map()
    }

    /// Entities whose name starts with `prefix`, in directory order.
    #[must_use]
    pub fn entities_with_prefix(&self, prefix: &str) -> Vec<Entity> {
        self.state.read().directory.with_prefix(prefix)
    }

    /// An entity's name, or an empty string if it has none.
    #[must_use]
    pub fn entity_key(&self, entity: Entity) -> String {
        self.state
            .read()
            .directory
            .name_of(entity)
            .unwrap_or_default()
            .to_owned()
    }

    /// The live entity with this name.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.state.read().directory.get(name)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Replaces the snapshot store with one record per named entity.
    ///
    /// The serializer fills each record from the entity's live components.
    /// If it fails, the previous snapshot is kept. Returns the number of
    /// records captured.
    ///
    /// # Errors
    ///
    /// The first error returned by `serializer`.
    pub fn backup<F>(&self, mut serializer: F) -> EcsResult<usize>
    where
        F: FnMut(&mut EntityRecord, EntityRef<'_>) -> EcsResult<()>,
    {
        let mut state = self.state.write();

        let mut records = Vec::with_capacity(state.directory.len());
        for (name, entity) in state.directory.iter() {
            let mut record = EntityRecord::new(entity, name);
            serializer(&mut record, EntityRef::new(&state, entity))?;
            records.push(record);
        }

        let captured = records.len();
        state.snapshot = Snapshot::from_records(records);
        tracing::debug!("Backed up {} entities", captured);
        Ok(captured)
    }

    /// Applies one record: finds or creates the entity with the record's name
    /// and lets the deserializer repopulate it.
    ///
    /// # Errors
    ///
    /// Capacity errors from creation, or the deserializer's error.
    pub fn restore_entity<F>(&self, record: &EntityRecord, mut deserializer: F) -> EcsResult<Entity>
    where
        F: FnMut(&EntityRecord, EntityMut<'_>) -> EcsResult<()>,
    {
        self.state.write().restore_entity(record, &mut deserializer)
    }

    /// Applies every stored record in capture order.
    ///
    /// Restoring is additive: entities created after the backup are left
    /// alone, and surviving entities are overwritten in place. The store is
    /// kept, so the same snapshot can be restored again. The whole pass runs
    /// under one exclusive lock. On error, records before the failing one stay
    /// applied. Returns the number of records applied.
    ///
    /// # Errors
    ///
    /// The first error from [`Coordinator::restore_entity`].
    pub fn restore<F>(&self, mut deserializer: F) -> EcsResult<usize>
    where
        F: FnMut(&EntityRecord, EntityMut<'_>) -> EcsResult<()>,
    {
        let mut state = self.state.write();
        let snapshot = std::mem::take(&mut state.snapshot);

        let mut outcome = Ok(snapshot.len());
        for record in snapshot.records() {
            if let Err(err) = state.restore_entity(record, &mut deserializer) {
                outcome = Err(err);
                break;
            }
        }

        state.snapshot = snapshot;
        if let Ok(applied) = outcome {
            tracing::debug!("Restored {} entities", applied);
        }
        outcome
    }

    /// Copy of the current snapshot store.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.read().snapshot.clone()
    }

    /// Replaces the snapshot store, e.g. with one decoded from disk.
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        self.state.write().snapshot = snapshot;
    }

    // =========================================================================
    // Deferred commands
    // =========================================================================

    /// Applies every queued command in send order under one exclusive lock.
    ///
    /// A failing command is logged and counted; the rest still run.
    pub fn apply_commands(&self, queue: &CommandQueue) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut state = self.state.write();

        while let Some(command) = queue.try_recv() {
            match command.apply(&mut state) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    tracing::warn!("Deferred command failed: {}", err);
                    report.failed.push(err);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Coordinator")
            .field("live_entities", &state.entities.live_count())
            .field("capacity", &state.entities.capacity())
            .field("component_types", &state.components.type_count())
            .field("systems", &state.systems.len())
            .field("snapshot_records", &state.snapshot.len())
            .finish()
    }
}
