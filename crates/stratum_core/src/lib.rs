//! # STRATUM Core
//!
//! Entity Component System for a real-time game engine:
//! - Small recyclable entity ids with a hard capacity ceiling
//! - Packed per-type component storage with O(1) add/remove/lookup
//! - Signature-matched systems whose entity sets stay current
//! - A synchronized world facade with named entities and snapshots
//!
//! ## Architecture Rules
//!
//! 1. **One entry point** - all access goes through [`Coordinator`]
//! 2. **Data-oriented design** - components live in contiguous arrays
//! 3. **No stale references** - component borrows are lock guards
//!
//! ## Example
//!
//! ```rust
//! use stratum_core::{Coordinator, Signature, WorldConfig};
//!
//! #[derive(Clone, Copy, Debug, Default)]
//! struct Transform { x: f32, y: f32 }
//! #[derive(Clone, Copy, Debug, Default)]
//! struct Gravity { g: f32 }
//!
//! #[derive(Default)]
//! struct GravitySystem;
//!
//! let world = Coordinator::new(WorldConfig::default()).unwrap();
//! let transform = world.register_component::<Transform>().unwrap();
//! let gravity = world.register_component::<Gravity>().unwrap();
//!
//! let system = world.register_system::<GravitySystem>().unwrap();
//! world
//!     .set_system_signature::<GravitySystem>(Signature::EMPTY.with(transform).with(gravity))
//!     .unwrap();
//!
//! let player = world.create_named_entity("CHAR").unwrap();
//! world.add_component(player, Transform::default()).unwrap();
//! world.add_component(player, Gravity { g: 9.8 }).unwrap();
//!
//! assert_eq!(system.entities(), vec![player]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod snapshot;
pub mod sync;

pub use config::{WorldConfig, MAX_COMPONENTS, MAX_ENTITIES};
pub use ecs::{
    Component, ComponentMut, ComponentRef, ComponentType, Coordinator, Entity,
    EntityMut, EntityRef, Signature, System, SystemHandle,
};
pub use error::{EcsError, EcsResult};
pub use snapshot::{EntityRecord, Snapshot};
pub use sync::{ApplyReport, CommandQueue, CommandSender, EntityTarget};
