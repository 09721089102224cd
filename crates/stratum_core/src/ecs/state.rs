//! # World State
//!
//! The unsynchronized composition of allocator, component store, system
//! registry, name directory and snapshot store. Every structural operation
//! here keeps the four in agreement:
//!
//! - a component is present  <=>  its tag bit is set in the signature
//! - a system's match set     ==   live entities whose signature covers it
//! - a live entity            <=>  exactly one directory entry
//!
//! Validation happens before the first write, so a failed operation
//! leaves nothing half-applied.
//!
//! [`Coordinator`](crate::Coordinator) wraps this in its lock; the entity
//! views below are what snapshot hooks and deferred commands operate on.

use super::component::{Component, ComponentType};
use super::directory::Directory;
use super::entity::{Entity, EntityAllocator};
use super::signature::Signature;
use super::storage::ComponentStore;
use super::system::SystemRegistry;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::snapshot::{EntityRecord, Snapshot};

/// Everything the coordinator guards.
pub(crate) struct WorldState {
    pub(crate) entities: EntityAllocator,
    pub(crate) components: ComponentStore,
    pub(crate) systems: SystemRegistry,
    pub(crate) directory: Directory,
    pub(crate) snapshot: Snapshot,
}

impl WorldState {
    /// Builds an empty world from a validated config.
    pub(crate) fn new(config: &WorldConfig) -> Self {
        Self {
            entities: EntityAllocator::new(config.max_entities),
            components: ComponentStore::new(config.max_entities, config.max_components),
            systems: SystemRegistry::default(),
            directory: Directory::new(config.key_length, config.key_seed),
            snapshot: Snapshot::default(),
        }
    }

    /// Creates an entity under a generated key.
    pub(crate) fn create(&mut self) -> EcsResult<Entity> {
        let entity = self.allocate()?;
        let key = self.directory.generate_key();
        tracing::debug!("Created entity {} as {}", entity, key);
        self.directory.insert(key, entity);
        Ok(entity)
    }

    /// Returns the entity named `name`, creating it if needed.
    pub(crate) fn create_named(&mut self, name: &str) -> EcsResult<Entity> {
        if let Some(entity) = self.directory.get(name) {
            return Ok(entity);
        }
        let entity = self.allocate()?;
        tracing::debug!("Created entity {} as {}", entity, name);
        self.directory.insert(name.to_owned(), entity);
        Ok(entity)
    }

    fn allocate(&mut self) -> EcsResult<Entity> {
        let entity = self.entities.create().map_err(|err| {
            tracing::warn!("Entity allocation failed: {}", err);
            err
        })?;
        // An empty signature still satisfies systems that require nothing
        self.systems.entity_signature_changed(entity, Signature::EMPTY);
        Ok(entity)
    }

    /// Destroys a live entity and cascades to every store.
    pub(crate) fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        self.entities.destroy(entity)?;
        self.components.entity_destroyed(entity);
        self.systems.entity_destroyed(entity);
        let name = self.directory.remove_entity(entity);
        tracing::debug!("Destroyed entity {} ({})", entity, name.unwrap_or_default());
        Ok(())
    }

    /// Resolves a name to a live entity.
    pub(crate) fn resolve(&self, name: &str) -> EcsResult<Entity> {
        self.directory
            .get(name)
            .ok_or_else(|| EcsError::UnknownName(name.to_owned()))
    }

    /// Adds a component unless the entity already has one of that type.
    ///
    /// Returns `false` for a skipped duplicate.
    pub(crate) fn add<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<bool> {
        let tag = self.components.tag_of::<C>()?;
        let mut signature = self.entities.signature(entity)?;
        if self.components.has::<C>(entity) {
            return Ok(false);
        }

        self.components.add(entity, value)?;
        signature.set(tag, true);
        self.commit_signature(entity, signature)?;
        tracing::trace!("Added tag {} to entity {}", tag, entity);
        Ok(true)
    }

    /// Adds a component, overwriting any existing value of that type.
    pub(crate) fn insert<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        if self.components.has::<C>(entity) {
            *self.components.get_mut::<C>(entity)? = value;
            return Ok(());
        }
        self.add(entity, value).map(drop)
    }

    /// Removes a component and returns it.
    pub(crate) fn remove<C: Component>(&mut self, entity: Entity) -> EcsResult<C> {
        let tag = self.components.tag_of::<C>()?;
        let mut signature = self.entities.signature(entity)?;

        let value = self.components.remove::<C>(entity)?;
        signature.set(tag, false);
        self.commit_signature(entity, signature)?;
        tracing::trace!("Removed tag {} from entity {}", tag, entity);
        Ok(value)
    }

    fn commit_signature(&mut self, entity: Entity, signature: Signature) -> EcsResult<()> {
        self.entities.set_signature(entity, signature)?;
        self.systems.entity_signature_changed(entity, signature);
        Ok(())
    }

    /// Gets a component, distinguishing why a lookup failed.
    pub(crate) fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.check_alive(entity)?;
        self.components.get::<C>(entity)
    }

    /// Gets a component mutably.
    pub(crate) fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.check_alive(entity)?;
        self.components.get_mut::<C>(entity)
    }

    /// The error a failed `get::<C>(entity)` would report.
    pub(crate) fn lookup_error<C: Component>(&self, entity: Entity) -> EcsError {
        match self.get::<C>(entity) {
            Err(err) => err,
            Ok(_) => EcsError::ComponentMissing {
                entity,
                type_name: super::component::short_type_name::<C>(),
            },
        }
    }

    fn check_alive(&self, entity: Entity) -> EcsResult<()> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::EntityNotAlive(entity))
        }
    }

    /// Creates or reuses the entity named in `record` and hands it to the
    /// deserializer.
    pub(crate) fn restore_entity<F>(&mut self, record: &EntityRecord, deserializer: &mut F) -> EcsResult<Entity>
    where
        F: FnMut(&EntityRecord, EntityMut<'_>) -> EcsResult<()>,
    {
        let entity = self.create_named(&record.name)?;
        deserializer(record, EntityMut::new(self, entity))?;
        Ok(entity)
    }
}

/// Read-only view of one live entity.
///
/// Handed to snapshot serializers.
pub struct EntityRef<'w> {
    state: &'w WorldState,
    entity: Entity,
}

impl<'w> EntityRef<'w> {
    pub(crate) fn new(state: &'w WorldState, entity: Entity) -> Self {
        Self { state, entity }
    }

    /// The entity being viewed.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The entity's directory name (empty if it has none).
    #[must_use]
    pub fn name(&self) -> &'w str {
        self.state.directory.name_of(self.entity).unwrap_or_default()
    }

    /// The entity's current signature.
    #[must_use]
    pub fn signature(&self) -> Signature {
        self.state
            .entities
            .signature(self.entity)
            .unwrap_or_default()
    }

    /// Gets a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] or [`EcsError::ComponentNotRegistered`].
    pub fn get<C: Component>(&self) -> EcsResult<&'w C> {
        self.state.get::<C>(self.entity)
    }

    /// Checks for a component.
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.state.components.has::<C>(self.entity)
    }
}

/// Mutable view of one live entity.
///
/// Handed to snapshot deserializers and deferred commands. Every structural
/// change made through it keeps signatures and system sets in sync.
pub struct EntityMut<'w> {
    state: &'w mut WorldState,
    entity: Entity,
}

impl<'w> EntityMut<'w> {
    pub(crate) fn new(state: &'w mut WorldState, entity: Entity) -> Self {
        Self { state, entity }
    }

    /// The entity being edited.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The entity's directory name (empty if it has none).
    #[must_use]
    pub fn name(&self) -> &str {
        self.state.directory.name_of(self.entity).unwrap_or_default()
    }

    /// The entity's current signature.
    #[must_use]
    pub fn signature(&self) -> Signature {
        self.state
            .entities
            .signature(self.entity)
            .unwrap_or_default()
    }

    /// Tag of a registered component type.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`] if `C` is unknown.
    pub fn component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.state.components.tag_of::<C>()
    }

    /// Gets a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] or [`EcsError::ComponentNotRegistered`].
    pub fn get<C: Component>(&self) -> EcsResult<&C> {
        self.state.get::<C>(self.entity)
    }

    /// Gets a component mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] or [`EcsError::ComponentNotRegistered`].
    pub fn get_mut<C: Component>(&mut self) -> EcsResult<&mut C> {
        self.state.get_mut::<C>(self.entity)
    }

    /// Checks for a component.
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.state.components.has::<C>(self.entity)
    }

    /// Adds a component; an existing one of the same type is kept.
    ///
    /// Returns `false` if the entity already had one.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`] or [`EcsError::EntityNotAlive`].
    pub fn add<C: Component>(&mut self, value: C) -> EcsResult<bool> {
        self.state.add(self.entity, value)
    }

    /// Adds a component, overwriting an existing one of the same type.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`] or [`EcsError::EntityNotAlive`].
    pub fn insert<C: Component>(&mut self, value: C) -> EcsResult<()> {
        self.state.insert(self.entity, value)
    }

    /// Removes a component and returns it.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if absent; the entity is unchanged.
    pub fn remove<C: Component>(&mut self) -> EcsResult<C> {
        self.state.remove::<C>(self.entity)
    }
}
