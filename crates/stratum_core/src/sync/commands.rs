//! # Deferred Commands
//!
//! Structural world changes recorded on one thread and applied on another.
//!
//! ```text
//! Network thread:  sender.create_named("CLIENT_7")
//!                  sender.insert("CLIENT_7", Transform { .. })
//!                        │
//!                  bounded channel
//!                        ▼
//! Frame start:     world.apply_commands(&queue)   (one exclusive lock)
//! Frame update:    systems iterate, no structural change can interleave
//! ```
//!
//! ## Invariants
//! - Commands apply in the order they were sent.
//! - Targets are resolved when applied, not when recorded, so a command can
//!   refer to an entity created by an earlier command in the same batch.
//! - A failing command does not stop the batch.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::ecs::state::{EntityMut, WorldState};
use crate::ecs::{Component, Entity};
use crate::error::{EcsError, EcsResult};

/// Default number of commands in flight before senders start dropping.
pub const DEFAULT_COMMAND_CAPACITY: usize = 4096;

/// Which entity a command applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityTarget {
    /// A known entity id.
    Id(Entity),
    /// A directory name, resolved when the command is applied.
    Named(String),
}

impl From<Entity> for EntityTarget {
    fn from(entity: Entity) -> Self {
        Self::Id(entity)
    }
}

impl From<&str> for EntityTarget {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for EntityTarget {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

type EditFn = Box<dyn for<'w> FnOnce(EntityMut<'w>) -> EcsResult<()> + Send>;

/// A recorded structural change.
pub enum Command {
    /// Create an entity under a name (no-op if the name is live).
    CreateNamed {
        /// Directory name for the entity.
        name: String,
    },

    /// Destroy an entity. A name that is not live is a no-op.
    Destroy {
        /// Entity to destroy.
        target: EntityTarget,
    },

    /// Apply a typed edit (add, insert or remove of one component).
    Edit {
        /// Entity to edit.
        target: EntityTarget,
        /// Component type the edit touches, for diagnostics.
        type_name: &'static str,
        /// The edit itself.
        edit: EditFn,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateNamed { name } => f.debug_struct("CreateNamed").field("name", name).finish(),
            Self::Destroy { target } => f.debug_struct("Destroy").field("target", target).finish(),
            Self::Edit {
                target, type_name, ..
            } => f
                .debug_struct("Edit")
                .field("target", target)
                .field("type_name", type_name)
                .finish_non_exhaustive(),
        }
    }
}

impl Command {
    /// Creation of a named entity.
    #[must_use]
    pub fn create_named(name: impl Into<String>) -> Self {
        Self::CreateNamed { name: name.into() }
    }

    /// Destruction of an entity.
    #[must_use]
    pub fn destroy(target: impl Into<EntityTarget>) -> Self {
        Self::Destroy {
            target: target.into(),
        }
    }

    /// An add that keeps an existing component of the same type.
    #[must_use]
    pub fn add<C: Component>(target: impl Into<EntityTarget>, value: C) -> Self {
        Self::edit::<C>(
            target.into(),
            Box::new(move |mut entity: EntityMut<'_>| entity.add(value).map(drop)),
        )
    }

    /// An add that overwrites an existing component of the same type.
    #[must_use]
    pub fn insert<C: Component>(target: impl Into<EntityTarget>, value: C) -> Self {
        Self::edit::<C>(
            target.into(),
            Box::new(move |mut entity: EntityMut<'_>| entity.insert(value)),
        )
    }

    /// Removal of a component.
    #[must_use]
    pub fn remove<C: Component>(target: impl Into<EntityTarget>) -> Self {
        Self::edit::<C>(
            target.into(),
            Box::new(|mut entity: EntityMut<'_>| entity.remove::<C>().map(drop)),
        )
    }

    fn edit<C: Component>(target: EntityTarget, edit: EditFn) -> Self {
        Self::Edit {
            target,
            type_name: crate::ecs::short_type_name::<C>(),
            edit,
        }
    }

    /// Applies this command to the world.
    pub(crate) fn apply(self, state: &mut WorldState) -> EcsResult<()> {
        match self {
            Self::CreateNamed { name } => state.create_named(&name).map(drop),
            Self::Destroy {
                target: EntityTarget::Id(entity),
            } => state.destroy(entity),
            Self::Destroy {
                target: EntityTarget::Named(name),
            } => match state.directory.get(&name) {
                Some(entity) => state.destroy(entity),
                None => Ok(()),
            },
            Self::Edit { target, edit, .. } => {
                let entity = match target {
                    EntityTarget::Id(entity) => entity,
                    EntityTarget::Named(name) => state.resolve(&name)?,
                };
                if !state.entities.is_alive(entity) {
                    return Err(EcsError::EntityNotAlive(entity));
                }
                edit(EntityMut::new(state, entity))
            }
        }
    }
}

/// Outcome of [`Coordinator::apply_commands`](crate::Coordinator::apply_commands).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Commands that succeeded.
    pub applied: usize,
    /// Errors of the commands that failed, in order.
    pub failed: Vec<EcsError>,
}

impl ApplyReport {
    /// Total commands drained.
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied + self.failed.len()
    }
}

/// Bounded command channel owned by the frame loop.
pub struct CommandQueue {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

impl CommandQueue {
    /// Creates a queue holding at most `capacity` pending commands.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of commands waiting.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Takes the next pending command without blocking.
    pub(crate) fn try_recv(&self) -> Option<Command> {
        self.receiver.try_recv().ok()
    }
}

/// Handle for recording commands from any thread.
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Sends a command (non-blocking).
    ///
    /// Returns `false` if the queue is full or gone; the command is dropped.
    #[must_use]
    pub fn send(&self, command: Command) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                tracing::warn!("Command queue full, dropping {:?}", command);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Sends a command, waiting for room.
    ///
    /// Returns `false` only if the queue is gone.
    #[must_use]
    pub fn send_blocking(&self, command: Command) -> bool {
        self.sender.send(command).is_ok()
    }

    /// Records creation of a named entity.
    #[must_use]
    pub fn create_named(&self, name: impl Into<String>) -> bool {
        self.send(Command::create_named(name))
    }

    /// Records destruction of an entity.
    #[must_use]
    pub fn destroy(&self, target: impl Into<EntityTarget>) -> bool {
        self.send(Command::destroy(target))
    }

    /// Records an add that keeps an existing component of the same type.
    #[must_use]
    pub fn add<C: Component>(&self, target: impl Into<EntityTarget>, value: C) -> bool {
        self.send(Command::add(target, value))
    }

    /// Records an add that overwrites an existing component of the same type.
    #[must_use]
    pub fn insert<C: Component>(&self, target: impl Into<EntityTarget>, value: C) -> bool {
        self.send(Command::insert(target, value))
    }

    /// Records removal of a component.
    #[must_use]
    pub fn remove<C: Component>(&self, target: impl Into<EntityTarget>) -> bool {
        self.send(Command::remove::<C>(target))
    }
}
