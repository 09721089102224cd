//! # World Snapshots
//!
//! Point-in-time captures of every named entity, produced by
//! [`Coordinator::backup`](crate::Coordinator::backup) and consumed by
//! [`Coordinator::restore`](crate::Coordinator::restore).
//!
//! ## Record layout
//!
//! Each record is one flat JSON object. The core owns two keys and the
//! caller's serializer owns the rest:
//!
//! ```text
//! {
//!   "entity": 3,          // id at capture time (informational)
//!   "eId": "CHAR",        // directory name, used to find the entity again
//!   "transform": { ... }  // whatever the serializer wrote
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};

/// Serialized state of one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity id when the record was captured.
    pub entity: Entity,
    /// Directory name of the entity.
    #[serde(rename = "eId")]
    pub name: String,
    /// Caller-defined payload.
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

impl EntityRecord {
    /// Creates a record with an empty payload.
    #[must_use]
    pub fn new(entity: Entity, name: impl Into<String>) -> Self {
        Self {
            entity,
            name: name.into(),
            state: Map::new(),
        }
    }

    /// Stores a serializable value under `key`.
    ///
    /// # Errors
    ///
    /// [`EcsError::SnapshotFormat`] if `key` is reserved or the value cannot
    /// be represented as JSON.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: &T) -> EcsResult<()> {
        if key == "entity" || key == "eId" {
            return Err(EcsError::SnapshotFormat(format!("{key:?} is a reserved key")));
        }
        let value = serde_json::to_value(value).map_err(|err| EcsError::SnapshotFormat(err.to_string()))?;
        self.state.insert(key.to_owned(), value);
        Ok(())
    }

    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// [`EcsError::SnapshotFormat`] if the stored value does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> EcsResult<Option<T>> {
        self.state
            .get(key)
            .map(|value| T::deserialize(value).map_err(|err| EcsError::SnapshotFormat(err.to_string())))
            .transpose()
    }

    /// Checks if the payload has `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }
}

/// Ordered list of entity records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<EntityRecord>,
}

impl Snapshot {
    /// Wraps records in capture order.
    #[must_use]
    pub fn from_records(records: Vec<EntityRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in capture order.
    #[must_use]
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Finds the record captured for `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&EntityRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// Encodes the snapshot as a JSON array.
    ///
    /// # Errors
    ///
    /// [`EcsError::SnapshotFormat`] if encoding fails.
    pub fn to_json(&self) -> EcsResult<String> {
        serde_json::to_string(self).map_err(|err| EcsError::SnapshotFormat(err.to_string()))
    }

    /// Decodes a snapshot produced by [`Snapshot::to_json`].
    ///
    /// # Errors
    ///
    /// [`EcsError::SnapshotFormat`] if the text is not a record array.
    pub fn from_json(text: &str) -> EcsResult<Self> {
        serde_json::from_str(text).map_err(|err| EcsError::SnapshotFormat(err.to_string()))
    }
}
