//! # Game Components
//!
//! Plain data attached to entities. Every component here also has a
//! snapshot key so the driver can back up and roll back the scene.

use serde::{Deserialize, Serialize};
use stratum_core::{EcsResult, EntityMut, EntityRecord, EntityRef};

/// Viewport width the camera is sized to.
pub const SCREEN_WIDTH: f32 = 1920.0;

/// Viewport height the camera is sized to.
pub const SCREEN_HEIGHT: f32 = 1080.0;

/// World-space rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
    /// Rotation in degrees.
    pub orientation: f32,
}

impl Transform {
    /// Creates an unrotated rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            orientation: 0.0,
        }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

/// Velocity and acceleration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematic {
    /// Horizontal velocity (units/s).
    pub vx: f32,
    /// Vertical velocity (units/s).
    pub vy: f32,
    /// Horizontal acceleration (units/s²).
    pub ax: f32,
    /// Vertical acceleration (units/s²).
    pub ay: f32,
}

/// Constant pull applied to an entity's position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Gravity {
    /// Horizontal pull (units/s).
    pub x: f32,
    /// Vertical pull (units/s).
    pub y: f32,
}

/// A view onto the world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Center x.
    pub x: f32,
    /// Center y.
    pub y: f32,
    /// Zoom factor (1.0 = unscaled).
    pub zoom: f32,
    /// Rotation in degrees.
    pub rotation: f32,
    /// Viewport width.
    pub viewport_width: f32,
    /// Viewport height.
    pub viewport_height: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: SCREEN_WIDTH / 2.0,
            y: SCREEN_HEIGHT / 2.0,
            zoom: 1.0,
            rotation: 0.0,
            viewport_width: SCREEN_WIDTH,
            viewport_height: SCREEN_HEIGHT,
        }
    }
}

/// Writes every known component of `entity` into its snapshot record.
///
/// # Errors
///
/// Propagates encoding failures from [`EntityRecord::insert`].
pub fn serialize(record: &mut EntityRecord, entity: EntityRef<'_>) -> EcsResult<()> {
    if let Ok(transform) = entity.get::<Transform>() {
        record.insert("transform", transform)?;
    }
    if let Ok(kinematic) = entity.get::<Kinematic>() {
        record.insert("kinematic", kinematic)?;
    }
    if let Ok(gravity) = entity.get::<Gravity>() {
        record.insert("gravity", gravity)?;
    }
    if let Ok(camera) = entity.get::<Camera>() {
        record.insert("camera", camera)?;
    }
    Ok(())
}

/// Overwrites `entity`'s components with the ones stored in `record`.
///
/// # Errors
///
/// Propagates decoding failures from [`EntityRecord::get`].
pub fn deserialize(record: &EntityRecord, mut entity: EntityMut<'_>) -> EcsResult<()> {
    if let Some(transform) = record.get::<Transform>("transform")? {
        entity.insert(transform)?;
    }
    if let Some(kinematic) = record.get::<Kinematic>("kinematic")? {
        entity.insert(kinematic)?;
    }
    if let Some(gravity) = record.get::<Gravity>("gravity")? {
        entity.insert(gravity)?;
    }
    if let Some(camera) = record.get::<Camera>("camera")? {
        entity.insert(camera)?;
    }
    Ok(())
}
