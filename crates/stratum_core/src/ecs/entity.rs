//! # Entity Management
//!
//! Entities are plain integer identities with no data of their own.
//! The allocator hands them out, recycles them, and owns each live
//! entity's [`Signature`].

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// Identity handle for an entity.
///
/// Unique among live entities. Once destroyed, the same value may be handed
/// out again by a later `create`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Wraps a raw id.
    ///
    /// Intended for tests and for decoding ids received from elsewhere; the
    /// result is only meaningful if the world currently has it alive.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the id as a slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pre-allocated allocator slot.
#[derive(Clone, Copy, Debug, Default)]
struct EntitySlot {
    signature: Signature,
    alive: bool,
}

/// Issues and recycles entity ids up to a fixed ceiling.
///
/// All slots and the free queue are allocated at construction. Recycling is
/// FIFO so a freshly destroyed id is the last one to come back.
pub(crate) struct EntityAllocator {
    slots: Box<[EntitySlot]>,
    available: VecDeque<u32>,
    live_count: usize,
}

impl EntityAllocator {
    /// Creates an allocator able to hold `capacity` live entities.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0 && capacity < u32::MAX as usize);

        let slots = vec![EntitySlot::default(); capacity].into_boxed_slice();
        #[allow(clippy::cast_possible_truncation)]
        let available = (0..capacity as u32).collect();

        Self {
            slots,
            available,
            live_count: 0,
        }
    }

    /// Maximum number of live entities.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entities.
    pub(crate) fn live_count(&self) -> usize {
        self.live_count
    }

    /// Hands out an id with an empty signature.
    pub(crate) fn create(&mut self) -> EcsResult<Entity> {
        let Some(id) = self.available.pop_front() else {
            return Err(EcsError::EntityCapacityExceeded {
                capacity: self.capacity(),
            });
        };

        self.slots[id as usize] = EntitySlot {
            signature: Signature::EMPTY,
            alive: true,
        };
        self.live_count += 1;

        Ok(Entity(id))
    }

    /// Releases a live id back to the pool.
    pub(crate) fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        let slot = self.live_slot_mut(entity)?;
        *slot = EntitySlot::default();

        self.live_count -= 1;
        self.available.push_back(entity.0);
        Ok(())
    }

    /// Checks if an id is currently live.
    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        self.slots.get(entity.index()).is_some_and(|slot| slot.alive)
    }

    /// Returns a live entity's signature.
    pub(crate) fn signature(&self, entity: Entity) -> EcsResult<Signature> {
        match self.slots.get(entity.index()) {
            Some(slot) if slot.alive => Ok(slot.signature),
            _ => Err(EcsError::EntityNotAlive(entity)),
        }
    }

    /// Overwrites a live entity's signature.
    pub(crate) fn set_signature(&mut self, entity: Entity, signature: Signature) -> EcsResult<()> {
        self.live_slot_mut(entity)?.signature = signature;
        Ok(())
    }

    /// Iterates `(entity, signature)` over every live entity in id order.
    pub(crate) fn live_signatures(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| {
                #[allow(clippy::cast_possible_truncation)]
                let entity = Entity(index as u32);
                (entity, slot.signature)
            })
    }

    fn live_slot_mut(&mut self, entity: Entity) -> EcsResult<&mut EntitySlot> {
        match self.slots.get_mut(entity.index()) {
            Some(slot) if slot.alive => Ok(slot),
            _ => Err(EcsError::EntityNotAlive(entity)),
        }
    }
}
