#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-refine
//!
//! mesh-refine refines triangle (2D) and tetrahedron (3D) meshes distributed
//! across cooperating ranks by Plaza longest-edge bisection. Every marked
//! edge is bisected, the marked set is first closed under the longest-edge
//! rule so no hanging nodes appear, and every new cell (and optionally facet)
//! records its parent.
//!
//! ## Features
//! - Uniform and marker-driven refinement of ordered simplex meshes
//! - Deterministic longest-edge selection shared by all ranks without communication
//! - Collective conformity closure across ranks
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Optional redistribution of the refined mesh through a [`CellPartitioner`](algs::distribute::CellPartitioner)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-refine = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ```
//! use mesh_refine::prelude::*;
//!
//! let mesh = structured_box_2d(2, 2, [0.0, 0.0], [1.0, 1.0])?;
//! let refined = refine(&mesh, &NoComm, RefineOptions::default())?;
//! assert_eq!(refined.mesh.num_cells(), 4 * mesh.num_cells());
//! # Ok::<(), MeshRefineError>(())
//! ```
//!
//! ## Determinism
//! Local numbering of every entity follows the global ids of its vertices, and
//! all collectives are processed in rank order, so repeated runs on the same
//! input and rank count produce identical meshes.

pub mod algs;
pub mod debug_invariants;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::distribute::{extract_shard, BlockPartitioner, CellPartitioner};
    pub use crate::algs::meshgen::{sphere_shell, structured_box_2d, structured_box_3d};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::mesh_error::MeshRefineError;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::marker::EntityMarker;
    pub use crate::topology::mesh::SimplexMesh;
    pub use crate::topology::point::GlobalId;
    pub use crate::topology::refine::{
        refine, refine_marked, refine_marked_with_partitioner, refine_with_relation,
        RefineOptions, RefinedMesh, RefinementStats,
    };
}
