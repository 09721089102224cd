//! # System Registry
//!
//! One instance per system type. Each system declares the components it
//! needs as a [`Signature`] and the registry keeps its set of matching
//! entities current as entity signatures change.
//!
//! ## Matching rule
//!
//! An entity belongs to a system when `(entity & required) == required`.
//! An entity may belong to many systems at once.
//!
//! ## Update locking
//!
//! ```text
//! Coordinator lock   ──► registry ──► MatchSet (write, brief)
//! SystemHandle::run  ──► state Mutex (held for the whole update)
//!                    └─► MatchSet (read, brief, copied out)
//! ```
//!
//! The match set is copied before the update closure runs, so an update may
//! call back into the coordinator without holding any registry lock.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use super::component::short_type_name;
use super::entity::Entity;
use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// Marker trait for system state types.
///
/// A system is constructed once with `Default` when registered and then
/// lives behind its handle's update mutex.
pub trait System: Default + Send + 'static {}

impl<T: Default + Send + 'static> System for T {}

/// Live set of entities matching a system's signature.
#[derive(Default)]
struct MatchSet {
    entities: RwLock<BTreeSet<Entity>>,
}

/// Shared handle to a registered system.
///
/// Returned by [`Coordinator::register_system`](crate::Coordinator::register_system);
/// registering the same type again returns a handle to the same instance.
pub struct SystemHandle<S: System> {
    members: Arc<MatchSet>,
    state: Mutex<S>,
}

impl<S: System> SystemHandle<S> {
    /// Sorted copy of the entities currently matching this system.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.members.entities.read().iter().copied().collect()
    }

    /// Checks if an entity currently matches this system.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.members.entities.read().contains(&entity)
    }

    /// Number of matching entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.entities.read().len()
    }

    /// Returns `true` if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.entities.read().is_empty()
    }

    /// Locks the system's state (the update mutex).
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    /// Runs one update: locks the state and passes it together with the
    /// entities matching at this moment.
    ///
    /// Entities destroyed by another thread during the update will fail their
    /// component lookups with a not-found error rather than yield stale data.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stratum_core::{Coordinator, Signature, WorldConfig};
    ///
    /// #[derive(Default)]
    /// struct Counter {
    ///     seen: usize,
    /// }
    ///
    /// let world = Coordinator::new(WorldConfig::default()).unwrap();
    /// let counter = world.register_system::<Counter>().unwrap();
    /// world.set_system_signature::<Counter>(Signature::EMPTY).unwrap();
    /// world.create_entity().unwrap();
    ///
    /// counter.run(|state, entities| state.seen += entities.len());
    /// assert_eq!(counter.lock().seen, 1);
    /// ```
    pub fn run<R>(&self, update: impl FnOnce(&mut S, &[Entity]) -> R) -> R {
        let mut state = self.state.lock();
        let entities = self.entities();
        update(&mut state, &entities)
    }
}

/// Registry bookkeeping for one system.
struct SystemSlot {
    type_name: &'static str,
    /// `None` until a signature is set; such a system matches nothing.
    required: Option<Signature>,
    members: Arc<MatchSet>,
    handle: Arc<dyn Any + Send + Sync>,
}

impl SystemSlot {
    fn evaluate(&self, entity: Entity, signature: Signature) {
        let Some(required) = self.required else {
            return;
        };
        let mut entities = self.members.entities.write();
        if signature.contains(required) {
            entities.insert(entity);
        } else {
            entities.remove(&entity);
        }
    }
}

/// Holds every registered system and its match set.
#[derive(Default)]
pub(crate) struct SystemRegistry {
    index: HashMap<TypeId, usize>,
    slots: Vec<SystemSlot>,
}

impl SystemRegistry {
    /// Number of registered systems.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Registers `S`, or returns the existing instance.
    pub(crate) fn register<S: System>(&mut self) -> Arc<SystemHandle<S>> {
        if let Some(handle) = self.existing::<S>() {
            return handle;
        }

        let members = Arc::new(MatchSet::default());
        let handle = Arc::new(SystemHandle {
            members: Arc::clone(&members),
            state: Mutex::new(S::default()),
        });

        self.index.insert(TypeId::of::<S>(), self.slots.len());
        self.slots.push(SystemSlot {
            type_name: short_type_name::<S>(),
            required: None,
            members,
            handle: Arc::clone(&handle) as Arc<dyn Any + Send + Sync>,
        });

        tracing::debug!("Registered system {}", short_type_name::<S>());
        handle
    }

    /// Required signature of `S`, if set.
    pub(crate) fn signature_of<S: System>(&self) -> EcsResult<Option<Signature>> {
        Ok(self.slot::<S>()?.required)
    }

    /// Sets the requirement of `S` and re-evaluates every live entity.
    pub(crate) fn set_signature<S: System>(
        &mut self,
        required: Signature,
        live: impl Iterator<Item = (Entity, Signature)>,
    ) -> EcsResult<()> {
        let position = self.position::<S>()?;
        let slot = &mut self.slots[position];
        slot.required = Some(required);

        let mut entities = slot.members.entities.write();
        entities.clear();
        entities.extend(
            live.filter(|(_, signature)| signature.contains(required))
                .map(|(entity, _)| entity),
        );

        tracing::debug!(
            "System {} now requires {:?} ({} matching)",
            slot.type_name,
            required,
            entities.len()
        );
        Ok(())
    }

    /// Re-evaluates one entity against every system.
    pub(crate) fn entity_signature_changed(&self, entity: Entity, signature: Signature) {
        for slot in &self.slots {
            slot.evaluate(entity, signature);
        }
    }

    /// Drops an entity from every system.
    pub(crate) fn entity_destroyed(&self, entity: Entity) {
        for slot in &self.slots {
            slot.members.entities.write().remove(&entity);
        }
    }

    fn existing<S: System>(&self) -> Option<Arc<SystemHandle<S>>> {
        let &position = self.index.get(&TypeId::of::<S>())?;
        Arc::clone(&self.slots[position].handle)
            .downcast::<SystemHandle<S>>()
            .ok()
    }

    fn position<S: System>(&self) -> EcsResult<usize> {
        self.index
            .get(&TypeId::of::<S>())
            .copied()
            .ok_or(EcsError::SystemNotRegistered {
                type_name: short_type_name::<S>(),
            })
    }

    fn slot<S: System>(&self) -> EcsResult<&SystemSlot> {
        let position = self.position::<S>()?;
        Ok(&self.slots[position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Gravity {
        ticks: u32,
    }

    #[derive(Default)]
    struct Render;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = SystemRegistry::default();
        let first = registry.register::<Gravity>();
        first.lock().ticks = 3;

        let second = registry.register::<Gravity>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().ticks, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unset_signature_matches_nothing() {
        let mut registry = SystemRegistry::default();
        let gravity = registry.register::<Gravity>();

        registry.entity_signature_changed(e(0), Signature::EMPTY.with(0));
        assert!(gravity.is_empty());
        assert_eq!(registry.signature_of::<Gravity>().unwrap(), None);
    }

    #[test]
    fn test_superset_matching() {
        let mut registry = SystemRegistry::default();
        let gravity = registry.register::<Gravity>();
        let render = registry.register::<Render>();

        let required = Signature::EMPTY.with(0).with(1);
        registry.set_signature::<Gravity>(required, std::iter::empty()).unwrap();
        registry
            .set_signature::<Render>(Signature::EMPTY.with(0), std::iter::empty())
            .unwrap();

        registry.entity_signature_changed(e(1), Signature::EMPTY.with(0));
        registry.entity_signature_changed(e(2), Signature::EMPTY.with(0).with(1).with(5));

        assert_eq!(gravity.entities(), vec![e(2)]);
        assert_eq!(render.entities(), vec![e(1), e(2)]);

        // Losing a required bit drops the entity
        registry.entity_signature_changed(e(2), Signature::EMPTY.with(1));
        assert!(gravity.is_empty());
        assert_eq!(render.entities(), vec![e(1)]);
    }

    #[test]
    fn test_set_signature_reevaluates_live_entities() {
        let mut registry = SystemRegistry::default();
        let gravity = registry.register::<Gravity>();

        let live = vec![
            (e(0), Signature::EMPTY.with(0)),
            (e(1), Signature::EMPTY.with(1)),
        ];
        registry
            .set_signature::<Gravity>(Signature::EMPTY.with(0), live.iter().copied())
            .unwrap();
        assert_eq!(gravity.entities(), vec![e(0)]);

        // Changing the requirement later drops stale members
        registry
            .set_signature::<Gravity>(Signature::EMPTY.with(1), live.iter().copied())
            .unwrap();
        assert_eq!(gravity.entities(), vec![e(1)]);
    }

    #[test]
    fn test_entity_destroyed_is_unconditional() {
        let mut registry = SystemRegistry::default();
        let render = registry.register::<Render>();
        registry
            .set_signature::<Render>(Signature::EMPTY, std::iter::empty())
            .unwrap();

        registry.entity_signature_changed(e(3), Signature::EMPTY);
        assert!(render.contains(e(3)));

        registry.entity_destroyed(e(3));
        assert!(!render.contains(e(3)));
    }

    #[test]
    fn test_unregistered_system() {
        let mut registry = SystemRegistry::default();
        assert_eq!(
            registry.set_signature::<Gravity>(Signature::EMPTY, std::iter::empty()),
            Err(EcsError::SystemNotRegistered { type_name: "Gravity" })
        );
    }

    #[test]
    fn test_run_passes_members() {
        let mut registry = SystemRegistry::default();
        let gravity = registry.register::<Gravity>();
        registry
            .set_signature::<Gravity>(Signature::EMPTY, [(e(4), Signature::EMPTY)].into_iter())
            .unwrap();

        let seen = gravity.run(|state, entities| {
            state.ticks += 1;
            entities.to_vec()
        });
        assert_eq!(seen, vec![e(4)]);
        assert_eq!(gravity.lock().ticks, 1);
    }
}
