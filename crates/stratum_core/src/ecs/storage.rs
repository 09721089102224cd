//! # Component Storage
//!
//! Packed, sparse-indexed storage with one column per component type.
//!
//! Each column keeps:
//! - a dense array of component values (what systems iterate over)
//! - a parallel dense array of owning entities
//! - a sparse index, pre-allocated to the entity capacity, mapping an
//!   entity id to its dense position
//!
//! Add, remove and lookup are O(1). Removal swaps the last dense element
//! into the hole, so iteration order is not preserved and any dense index
//! taken before a removal is stale afterwards. The [`Coordinator`] hands out
//! component references only as lock guards, so no reference can outlive a
//! structural change.
//!
//! [`Coordinator`]: crate::Coordinator

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::component::{short_type_name, Component, ComponentType};
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Sparse slot marker for "no component".
const VACANT: u32 = u32::MAX;

/// Packed storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
pub struct ComponentColumn<C: Component> {
    /// Component values, densely packed.
    dense: Vec<C>,
    /// Owner of each dense value (same order as `dense`).
    owners: Vec<Entity>,
    /// Entity id -> dense position, `VACANT` when absent.
    sparse: Box<[u32]>,
}

impl<C: Component> ComponentColumn<C> {
    /// Creates an empty column for entity ids below `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: vec![VACANT; capacity].into_boxed_slice(),
        }
    }

    /// Number of stored components.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if no entity has this component.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Checks whether `entity` has a value in this column.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Inserts a value for an entity that does not have one yet.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if the entity already has one,
    /// [`EcsError::EntityNotAlive`] if the id is outside the column's range.
    pub fn insert(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        let Some(&slot) = self.sparse.get(entity.index()) else {
            return Err(EcsError::EntityNotAlive(entity));
        };
        if slot != VACANT {
            return Err(EcsError::DuplicateComponent {
                entity,
                type_name: short_type_name::<C>(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let position = self.dense.len() as u32;
        self.dense.push(value);
        self.owners.push(entity);
        self.sparse[entity.index()] = position;
        Ok(())
    }

    /// Removes and returns an entity's value, swapping the last value into
    /// its place.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if the entity has no value here.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<C> {
        let Some(position) = self.slot(entity) else {
            return Err(self.missing(entity));
        };

        let value = self.dense.swap_remove(position);
        self.owners.swap_remove(position);
        self.sparse[entity.index()] = VACANT;

        // Repoint whichever entity was moved into the hole
        if let Some(&moved) = self.owners.get(position) {
            #[allow(clippy::cast_possible_truncation)]
            let position = position as u32;
            self.sparse[moved.index()] = position;
        }

        Ok(value)
    }

    /// Gets an entity's value.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if the entity has no value here.
    pub fn get(&self, entity: Entity) -> EcsResult<&C> {
        match self.slot(entity) {
            Some(position) => Ok(&self.dense[position]),
            None => Err(self.missing(entity)),
        }
    }

    /// Gets an entity's value mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if the entity has no value here.
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        match self.slot(entity) {
            Some(position) => Ok(&mut self.dense[position]),
            None => Err(self.missing(entity)),
        }
    }

    /// Owners in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Iterates `(owner, value)` in dense order.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    /// Iterates `(owner, value)` mutably in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    fn slot(&self, entity: Entity) -> Option<usize> {
        match self.sparse.get(entity.index()) {
            Some(&slot) if slot != VACANT => Some(slot as usize),
            _ => None,
        }
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::ComponentMissing {
            entity,
            type_name: short_type_name::<C>(),
        }
    }
}

/// Uniform operations over a column whose component type is erased.
trait ErasedColumn: Send + Sync {
    fn entity_destroyed(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedColumn for ComponentColumn<C> {
    fn entity_destroyed(&mut self, entity: Entity) {
        if self.contains(entity) {
            // Presence was just checked; the removed value is dropped
            let _ = self.remove(entity);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registered column plus its type name for diagnostics.
struct ColumnEntry {
    type_name: &'static str,
    column: Box<dyn ErasedColumn>,
}

/// All component columns, indexed by their [`ComponentType`] tag.
pub(crate) struct ComponentStore {
    tags: HashMap<TypeId, ComponentType>,
    columns: Vec<ColumnEntry>,
    entity_capacity: usize,
    max_components: usize,
}

impl ComponentStore {
    /// Creates an empty store.
    pub(crate) fn new(entity_capacity: usize, max_components: usize) -> Self {
        Self {
            tags: HashMap::new(),
            columns: Vec::with_capacity(max_components),
            entity_capacity,
            max_components,
        }
    }

    /// Number of registered component types.
    pub(crate) fn type_count(&self) -> usize {
        self.columns.len()
    }

    /// Assigns `C` a tag, or returns the one it already has.
    pub(crate) fn register<C: Component>(&mut self) -> EcsResult<ComponentType> {
        if let Some(&tag) = self.tags.get(&TypeId::of::<C>()) {
            return Ok(tag);
        }
        if self.columns.len() >= self.max_components {
            tracing::warn!(
                "Cannot register {}: all {} component types in use",
                short_type_name::<C>(),
                self.max_components
            );
            return Err(EcsError::ComponentCapacityExceeded {
                capacity: self.max_components,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let tag = self.columns.len() as ComponentType;
        self.columns.push(ColumnEntry {
            type_name: short_type_name::<C>(),
            column: Box::new(ComponentColumn::<C>::new(self.entity_capacity)),
        });
        self.tags.insert(TypeId::of::<C>(), tag);

        tracing::debug!("Registered component {} as tag {}", short_type_name::<C>(), tag);
        Ok(tag)
    }

    /// Returns the tag of a registered type.
    pub(crate) fn tag_of<C: Component>(&self) -> EcsResult<ComponentType> {
        self.tags
            .get(&TypeId::of::<C>())
            .copied()
            .ok_or_else(|| EcsError::ComponentNotRegistered {
                type_name: short_type_name::<C>(),
            })
    }

    /// Name of the type registered under `tag`.
    pub(crate) fn type_name(&self, tag: ComponentType) -> Option<&'static str> {
        self.columns.get(usize::from(tag)).map(|entry| entry.type_name)
    }

    /// Typed access to a registered column.
    pub(crate) fn column<C: Component>(&self) -> EcsResult<&ComponentColumn<C>> {
        let tag = self.tag_of::<C>()?;
        // The tag table and the column list are only ever extended together
        self.columns[usize::from(tag)]
            .column
            .as_any()
            .downcast_ref::<ComponentColumn<C>>()
            .ok_or_else(|| EcsError::ComponentNotRegistered {
                type_name: short_type_name::<C>(),
            })
    }

    /// Typed mutable access to a registered column.
    pub(crate) fn column_mut<C: Component>(&mut self) -> EcsResult<&mut ComponentColumn<C>> {
        let tag = self.tag_of::<C>()?;
        self.columns[usize::from(tag)]
            .column
            .as_any_mut()
            .downcast_mut::<ComponentColumn<C>>()
            .ok_or_else(|| EcsError::ComponentNotRegistered {
                type_name: short_type_name::<C>(),
            })
    }

    /// Adds a component. Fails on duplicates.
    pub(crate) fn add<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        self.column_mut::<C>()?.insert(entity, value)
    }

    /// Removes a component, returning it.
    pub(crate) fn remove<C: Component>(&mut self, entity: Entity) -> EcsResult<C> {
        self.column_mut::<C>()?.remove(entity)
    }

    /// Gets a component.
    pub(crate) fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.column::<C>()?.get(entity)
    }

    /// Gets a component mutably.
    pub(crate) fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.column_mut::<C>()?.get_mut(entity)
    }

    /// Checks for a component. Unregistered types are never present.
    pub(crate) fn has<C: Component>(&self, entity: Entity) -> bool {
        self.column::<C>()
            .map(|column| column.contains(entity))
            .unwrap_or(false)
    }

    /// Drops every component the entity owns.
    pub(crate) fn entity_destroyed(&mut self, entity: Entity) {
        for entry in &mut self.columns {
            entry.column.entity_destroyed(entity);
        }
    }
}
