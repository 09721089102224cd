//! # Entity Directory
//!
//! Bijective name <-> entity mapping for externally addressable entities.
//! Every entity created through the coordinator is named; unnamed creation
//! draws a random alphanumeric key.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::entity::Entity;

/// Name directory for live entities.
pub(crate) struct Directory {
    by_name: HashMap<String, Entity>,
    by_entity: HashMap<Entity, String>,
    rng: StdRng,
    key_length: usize,
}

impl Directory {
    /// Creates an empty directory.
    pub(crate) fn new(key_length: usize, key_seed: u64) -> Self {
        Self {
            by_name: HashMap::new(),
            by_entity: HashMap::new(),
            rng: StdRng::seed_from_u64(key_seed),
            key_length,
        }
    }

    /// Number of named entities.
    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Looks up an entity by name.
    pub(crate) fn get(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    /// Looks up an entity's name.
    pub(crate) fn name_of(&self, entity: Entity) -> Option<&str> {
        self.by_entity.get(&entity).map(String::as_str)
    }

    /// Records a name for a freshly created entity.
    ///
    /// The caller guarantees neither side is already present.
    pub(crate) fn insert(&mut self, name: String, entity: Entity) {
        debug_assert!(!self.by_name.contains_key(&name));
        debug_assert!(!self.by_entity.contains_key(&entity));

        self.by_entity.insert(entity, name.clone());
        self.by_name.insert(name, entity);
    }

    /// Removes an entity's entry, returning its name.
    pub(crate) fn remove_entity(&mut self, entity: Entity) -> Option<String> {
        let name = self.by_entity.remove(&entity)?;
        self.by_name.remove(&name);
        Some(name)
    }

    /// Draws a random key not currently in use.
    pub(crate) fn generate_key(&mut self) -> String {
        loop {
            let key: String = (&mut self.rng)
                .sample_iter(&Alphanumeric)
                .take(self.key_length)
                .map(char::from)
                .collect();
            if !self.by_name.contains_key(&key) {
                return key;
            }
        }
    }

    /// Iterates `(name, entity)` in map order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Entity)> {
        self.by_name.iter().map(|(name, &entity)| (name.as_str(), entity))
    }

    /// Entities whose name begins with `prefix`.
    pub(crate) fn with_prefix(&self, prefix: &str) -> Vec<Entity> {
        self.iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, entity)| entity)
            .collect()
    }

    /// Copy of the name -> entity map.
    pub(crate) fn to_map(&self) -> HashMap<String, Entity> {
        self.by_name.clone()
    }
}
