//! `GlobalId`: a strong, zero-cost handle for globally numbered mesh entities
//!
//! Vertices and cells of a distributed mesh carry a global index that is
//! identical on every rank holding a copy of the entity. `GlobalId` wraps the
//! raw `u64` so that global and rank-local indices (plain `usize`) cannot be
//! mixed up by accident.
//!
//! This module provides:
//! - A transparent `GlobalId` newtype around `u64` for zero-cost wire and
//!   memory layout guarantees.
//! - Implementations of common traits (`Debug`, `Display`, ordering,
//!   hashing) so `GlobalId` can be used in ordered maps and printed easily.

use std::fmt;

/// Global index of a mesh entity.
///
/// Ordering of `GlobalId` is the total order used for every deterministic
/// decision in refinement (cell vertex ordering, longest-edge tie-breaks,
/// ownership of shared entities).
///
/// # Memory layout
/// This type is `repr(transparent)`, meaning it has the same ABI and
/// alignment as `u64` and can be put on the wire exactly like a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Creates a new `GlobalId` from a raw `u64` value.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mesh_refine::topology::point::GlobalId;
    /// let g = GlobalId::new(7);
    /// assert_eq!(g.get(), 7);
    /// ```
    #[inline]
    pub const fn new(raw: u64) -> Self {
        GlobalId(raw)
    }

    /// Returns the inner `u64` value of this `GlobalId`.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for GlobalId {
    #[inline]
    fn from(raw: u64) -> Self {
        GlobalId(raw)
    }
}

/// Custom `Debug` implementation to display as `GlobalId(raw_value)`.
impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalId").field(&self.0).finish()
    }
}

/// Prints only the raw integer.
impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `GlobalId` can be sent over MPI as a `u64`.
#[cfg(feature = "mpi-support")]
unsafe impl mpi::datatype::Equivalence for GlobalId {
    type Out = <u64 as mpi::datatype::Equivalence>::Out;

    fn equivalent_datatype() -> Self::Out {
        u64::equivalent_datatype()
    }
}
