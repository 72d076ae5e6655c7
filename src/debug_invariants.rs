//! Opt-in structural checks for meshes and refinement state.
//!
//! Checks run unconditionally in debug builds, and in release builds when the
//! `check-invariants` or `strict-invariants` feature is enabled.

use crate::mesh_error::MeshRefineError;

/// Types that can verify their own structural invariants.
pub trait DebugInvariants {
    /// Panic if an invariant is broken (no-op unless checks are enabled).
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), MeshRefineError>;
}

/// Evaluate a `Result`-returning check and panic with context on `Err`,
/// only when invariant checking is compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
