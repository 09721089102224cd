//! # Entity Component System
//!
//! Sparse-indexed packed storage behind a single synchronized facade.
//!
//! ## Design Philosophy
//!
//! - Entity slots and sparse indices are pre-allocated at world creation
//! - Components are stored in dense arrays for cache efficiency
//! - Entity ids are small recyclable integers
//! - System membership is a signature superset test, kept current on every
//!   structural change

mod component;
mod coordinator;
mod directory;
mod entity;
mod signature;
pub(crate) mod state;
mod storage;
mod system;

pub use component::{short_type_name, Component, ComponentType};
pub use coordinator::{ComponentMut, ComponentRef, Coordinator};
pub use entity::Entity;
pub use signature::Signature;
pub use state::{EntityMut, EntityRef};
pub use system::{System, SystemHandle};
