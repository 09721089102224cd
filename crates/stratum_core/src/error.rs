//! # ECS Error Types
//!
//! All errors that can occur while operating on the world.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the ECS core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Tried to create more live entities than the world allows.
    #[error("entity capacity exceeded: at most {capacity} live entities")]
    EntityCapacityExceeded {
        /// Configured maximum of live entities.
        capacity: usize,
    },

    /// Tried to register more component types than the signature can hold.
    #[error("component capacity exceeded: at most {capacity} component types")]
    ComponentCapacityExceeded {
        /// Configured maximum of component types.
        capacity: usize,
    },

    /// The entity is not live (never created, or already destroyed).
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),

    /// The entity does not own a component of the requested type.
    #[error("entity {entity} has no {type_name} component")]
    ComponentMissing {
        /// The entity that was queried.
        entity: Entity,
        /// Name of the component type.
        type_name: &'static str,
    },

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has a {type_name} component")]
    DuplicateComponent {
        /// The entity that was targeted.
        entity: Entity,
        /// Name of the component type.
        type_name: &'static str,
    },

    /// The component type was used before `register_component`.
    #[error("component type {type_name} is not registered")]
    ComponentNotRegistered {
        /// Name of the component type.
        type_name: &'static str,
    },

    /// The system type was used before `register_system`.
    #[error("system type {type_name} is not registered")]
    SystemNotRegistered {
        /// Name of the system type.
        type_name: &'static str,
    },

    /// No live entity carries this directory name.
    #[error("no entity named {0:?}")]
    UnknownName(String),

    /// Invalid world configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot format error: {0}")]
    SnapshotFormat(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
