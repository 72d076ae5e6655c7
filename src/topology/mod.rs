//! Mesh topology: global ids, simplex cell types, rank-local meshes,
//! refinement markers and the refinement engine itself.
//!
//! Most users will build a [`mesh::SimplexMesh`], mark entities with an
//! [`marker::EntityMarker`] and call one of the [`refine`] entry points.

pub mod cell_type;
pub mod marker;
pub mod mesh;
pub mod point;
pub mod refine;

pub use cell_type::CellType;
pub use mesh::SimplexMesh;
pub use point::GlobalId;
