//! # Component System
//!
//! Components are pure data containers with no behavior.
//! Any thread-safe `'static` type can be a component; it receives its
//! [`ComponentType`] tag when first registered with the world.

/// Small integer tag identifying a component type.
///
/// Tags are handed out in registration order starting at 0 and are never
/// reused for the lifetime of a world. The tag is also the component's bit in
/// every [`Signature`](super::Signature).
pub type ComponentType = u8;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Send + Sync`: the world is shared between the simulation thread and
///   background threads
/// - `'static`: stored type-erased and recovered by `TypeId`
///
/// It is implemented for every type that satisfies those bounds.
///
/// # Example
///
/// ```rust
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Transform {
///     x: f32,
///     y: f32,
/// }
///
/// fn assert_component<C: stratum_core::Component>() {}
/// assert_component::<Transform>();
/// ```
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Short, human-readable name of a component or system type.
///
/// Strips the module path so logs and errors read `Transform` rather than
/// `game::components::Transform`.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Generic arguments may contain paths too; only trim before them
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}
