//! # World Configuration
//!
//! Capacity ceilings and key generation settings, fixed when the
//! [`Coordinator`](crate::Coordinator) is constructed.
//!
//! **CRITICAL:** `MAX_COMPONENTS` is the width of the signature bitset and is
//! baked in at compile time. `max_entities` may be lowered or raised per
//! world at startup, but never changes afterwards.

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

// =============================================================================
// CAPACITY CONSTANTS
// =============================================================================

/// Default maximum number of concurrently live entities.
pub const MAX_ENTITIES: usize = 5000;

/// Maximum number of component types (one signature bit each).
pub const MAX_COMPONENTS: usize = 64;

/// Length of the random alphanumeric key given to unnamed entities.
pub const DEFAULT_KEY_LENGTH: usize = 12;

/// Configuration for a world.
///
/// # Example
///
/// ```rust
/// use stratum_core::WorldConfig;
///
/// let config = WorldConfig::from_toml_str("max_entities = 128").unwrap();
/// assert_eq!(config.max_entities, 128);
/// assert_eq!(config.max_components, stratum_core::MAX_COMPONENTS);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Maximum number of concurrently live entities.
    pub max_entities: usize,
    /// Maximum number of registered component types (at most `MAX_COMPONENTS`).
    pub max_components: usize,
    /// Length of generated entity keys.
    pub key_length: usize,
    /// Seed for the key generator.
    pub key_seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: MAX_ENTITIES,
            max_components: MAX_COMPONENTS,
            key_length: DEFAULT_KEY_LENGTH,
            key_seed: 0x5EED_CAFE,
        }
    }
}

impl WorldConfig {
    /// Returns the default configuration with a different entity ceiling.
    #[must_use]
    pub fn with_max_entities(max_entities: usize) -> Self {
        Self {
            max_entities,
            ..Self::default()
        }
    }

    /// Parses and validates a configuration from TOML.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the TOML is malformed or a value
    /// is out of range.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| EcsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_entities == 0 {
            return Err(EcsError::InvalidConfig(
                "max_entities must be greater than zero".into(),
            ));
        }
        // u32::MAX is the vacancy sentinel of the sparse index
        if self.max_entities >= u32::MAX as usize {
            return Err(EcsError::InvalidConfig(format!(
                "max_entities must be below {}",
                u32::MAX
            )));
        }
        if self.max_components == 0 || self.max_components > MAX_COMPONENTS {
            return Err(EcsError::InvalidConfig(format!(
                "max_components must be within 1..={MAX_COMPONENTS}"
            )));
        }
        if self.key_length == 0 {
            return Err(EcsError::InvalidConfig(
                "key_length must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
