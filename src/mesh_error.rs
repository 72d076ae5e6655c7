//! MeshRefineError: Unified error type for mesh-refine public APIs
//!
//! Every failure reported by this crate is a contract violation (bad input
//! mesh, bad marking, inconsistent collective state). Refinement is
//! all-or-nothing: a call that returns `Err` produces no output mesh.

use crate::topology::point::GlobalId;
use thiserror::Error;

/// Unified error type for mesh-refine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshRefineError {
    /// Only triangle (2) and tetrahedron (3) meshes can be refined.
    #[error("Topological dimension {0} not supported")]
    UnsupportedDimension(usize),
    /// Geometric dimension must be at least the topological one and at most 3.
    #[error("Geometric dimension {gdim} not supported for topological dimension {tdim}")]
    UnsupportedGeometricDimension { tdim: usize, gdim: usize },
    /// The bisector was invoked on a cell whose designated longest edge is unmarked.
    #[error("Longest edge {edge} of cell {cell} is not marked")]
    LongestEdgeNotMarked { cell: usize, edge: usize },
    /// A per-cell or per-entity buffer does not have the expected length.
    #[error("{what}: expected length {expected}, found {found}")]
    IndexBufferMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A cell references a vertex index that does not exist.
    #[error("Cell {cell} references vertex {vertex}, but only {num_vertices} vertices exist")]
    VertexOutOfRange {
        cell: usize,
        vertex: usize,
        num_vertices: usize,
    },
    /// A cell lists the same vertex more than once.
    #[error("Cell {0} repeats a vertex")]
    DegenerateCell(usize),
    /// Two vertices (or two cells) share a global index.
    #[error("Global index {0} is used more than once")]
    DuplicateGlobalId(GlobalId),
    /// Two candidate longest edges of a face have equal length and equal tie-break key.
    #[error("Longest edge of face {face} is ambiguous: equal length and equal tie-break vertex")]
    AmbiguousLongestEdge { face: usize },
    /// A marked edge has no entry in the new-vertex map.
    #[error("Marked edge {edge} has no new vertex")]
    MissingNewVertex { edge: usize },
    /// A mesh edge index is past the end of the edge table.
    #[error("Edge {edge} out of range: mesh has {num_edges} edges")]
    EdgeOutOfRange { edge: usize, num_edges: usize },
    /// A mesh edge index is not one of the edges of the given cell.
    #[error("Edge {edge} is not an edge of cell {cell}")]
    EdgeNotInCell { cell: usize, edge: usize },
    /// Marker values do not cover every entity of the marker dimension.
    #[error("Marker of dimension {dim}: expected {expected} values, found {found}")]
    MarkerSizeMismatch {
        dim: usize,
        expected: usize,
        found: usize,
    },
    /// Marker dimension exceeds the topological dimension of the mesh.
    #[error("Marker dimension {dim} exceeds mesh dimension {tdim}")]
    MarkerDimension { dim: usize, tdim: usize },
    /// A communication step with a neighbour failed.
    #[error("Communication error with rank {neighbor}: {message}")]
    Comm { neighbor: usize, message: String },
    /// A received buffer could not be decoded into whole wire records.
    #[error("Malformed message from rank {neighbor}: record size {record}, got {found} bytes")]
    MalformedMessage {
        neighbor: usize,
        record: usize,
        found: usize,
    },
    /// A structural invariant does not hold.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl MeshRefineError {
    /// Attach the offending cell to errors raised by per-cell routines that
    /// do not know which cell they were called for.
    pub(crate) fn at_cell(self, cell: usize) -> Self {
        match self {
            MeshRefineError::LongestEdgeNotMarked { edge, .. } => {
                MeshRefineError::LongestEdgeNotMarked { cell, edge }
            }
            MeshRefineError::EdgeNotInCell { edge, .. } => MeshRefineError::EdgeNotInCell { cell, edge },
            other => other,
        }
    }
}
