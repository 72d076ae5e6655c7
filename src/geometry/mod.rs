//! Geometry utilities for mesh-refine.
//!
//! Lengths, midpoints and simplex measures evaluated on raw vertex
//! coordinates.

pub mod metrics;
