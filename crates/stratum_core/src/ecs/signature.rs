//! # Signatures
//!
//! A fixed-width bitset with one bit per component type tag.
//! Matching a system against an entity is a single AND and compare.

use std::fmt;

use super::component::ComponentType;

/// Bitset of component type tags.
///
/// Bit `i` is set if and only if the owner holds a component whose type was
/// assigned tag `i`. Tags above 63 are rejected at registration, so every
/// operation here assumes `tag < MAX_COMPONENTS`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature(u64);

impl Signature {
    /// The empty signature.
    pub const EMPTY: Self = Self(0);

    /// Creates a signature from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Sets or clears the bit for a component tag.
    #[inline]
    pub fn set(&mut self, tag: ComponentType, value: bool) {
        if value {
            self.0 |= 1 << tag;
        } else {
            self.0 &= !(1 << tag);
        }
    }

    /// Returns a copy with the bit for `tag` set.
    #[inline]
    #[must_use]
    pub const fn with(self, tag: ComponentType) -> Self {
        Self(self.0 | (1 << tag))
    }

    /// Checks the bit for a component tag.
    #[inline]
    #[must_use]
    pub const fn test(self, tag: ComponentType) -> bool {
        (self.0 & (1 << tag)) != 0
    }

    /// Returns `true` if every bit of `required` is also set here.
    #[inline]
    #[must_use]
    pub const fn contains(self, required: Self) -> bool {
        (self.0 & required.0) == required.0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl FromIterator<ComponentType> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:#066b})", self.0)
    }
}
