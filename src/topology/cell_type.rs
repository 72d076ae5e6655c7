//! Simplex cell types and their reference-local numbering.
//!
//! Local numbering follows the ordered-simplex convention:
//! - cell vertices are stored sorted by [`GlobalId`](crate::topology::point::GlobalId);
//! - triangle edge `i` is opposite vertex `i`;
//! - tetrahedron edge `i` joins the vertex pair in [`TETRAHEDRON_EDGES`]`[i]`,
//!   so edge `5 - i` is the edge opposite edge `i`;
//! - tetrahedron face `i` is opposite vertex `i`;
//! - within any triangle (cell or face), face edge `k` is opposite face vertex `k`.
//!
//! Bisection works on a combined local node numbering: nodes `0..=tdim` are the
//! cell vertices, node `tdim + 1 + e` is the midpoint of local edge `e`.

use crate::mesh_error::MeshRefineError;

/// Vertex pairs of the three triangle edges.
pub const TRIANGLE_EDGES: [[usize; 2]; 3] = [[1, 2], [0, 2], [0, 1]];

/// Vertex pairs of the six tetrahedron edges.
pub const TETRAHEDRON_EDGES: [[usize; 2]; 6] = [[2, 3], [1, 3], [1, 2], [0, 3], [0, 2], [0, 1]];

/// Vertices of the four tetrahedron faces (face `i` omits vertex `i`).
pub const TETRAHEDRON_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// Simplex cell types supported by refinement.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellType {
    /// 2D simplex.
    Triangle,
    /// 3D simplex.
    Tetrahedron,
}

impl CellType {
    /// Cell type for a topological dimension.
    ///
    /// # Errors
    /// [`MeshRefineError::UnsupportedDimension`] unless `tdim` is 2 or 3.
    pub fn from_tdim(tdim: usize) -> Result<Self, MeshRefineError> {
        match tdim {
            2 => Ok(CellType::Triangle),
            3 => Ok(CellType::Tetrahedron),
            other => Err(MeshRefineError::UnsupportedDimension(other)),
        }
    }

    /// Topological dimension.
    pub const fn tdim(self) -> usize {
        match self {
            CellType::Triangle => 2,
            CellType::Tetrahedron => 3,
        }
    }

    pub const fn num_vertices(self) -> usize {
        self.tdim() + 1
    }

    pub const fn num_edges(self) -> usize {
        match self {
            CellType::Triangle => 3,
            CellType::Tetrahedron => 6,
        }
    }

    /// Facets are the `tdim - 1` entities: edges of a triangle, faces of a tetrahedron.
    pub const fn num_facets(self) -> usize {
        self.tdim() + 1
    }

    /// Number of nodes in the bisection numbering (vertices + edge midpoints).
    pub const fn num_nodes(self) -> usize {
        self.num_vertices() + self.num_edges()
    }

    /// Local vertex pairs of each edge.
    pub fn edge_vertices(self) -> &'static [[usize; 2]] {
        match self {
            CellType::Triangle => &TRIANGLE_EDGES,
            CellType::Tetrahedron => &TETRAHEDRON_EDGES,
        }
    }

    /// Local index of the edge joining local vertices `a` and `b`.
    pub fn edge_between(self, a: usize, b: usize) -> Option<usize> {
        let key = if a < b { [a, b] } else { [b, a] };
        self.edge_vertices().iter().position(|e| *e == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_roundtrip() {
        assert_eq!(CellType::from_tdim(2).unwrap(), CellType::Triangle);
        assert_eq!(CellType::from_tdim(3).unwrap(), CellType::Tetrahedron);
        assert_eq!(
            CellType::from_tdim(1),
            Err(MeshRefineError::UnsupportedDimension(1))
        );
        assert_eq!(CellType::Tetrahedron.num_nodes(), 10);
        assert_eq!(CellType::Triangle.num_nodes(), 6);
    }

    #[test]
    fn triangle_edge_is_opposite_its_vertex() {
        for (i, e) in TRIANGLE_EDGES.iter().enumerate() {
            assert!(!e.contains(&i));
        }
    }

    #[test]
    fn tetrahedron_opposite_edges_are_disjoint() {
        for i in 0..6 {
            let a = TETRAHEDRON_EDGES[i];
            let b = TETRAHEDRON_EDGES[5 - i];
            assert!(a.iter().all(|v| !b.contains(v)));
        }
    }

    #[test]
    fn tetrahedron_face_omits_its_vertex() {
        for (i, f) in TETRAHEDRON_FACES.iter().enumerate() {
            assert!(!f.contains(&i));
        }
        assert_eq!(CellType::Tetrahedron.edge_between(3, 0), Some(3));
        assert_eq!(CellType::Tetrahedron.edge_between(1, 1), None);
    }
}
