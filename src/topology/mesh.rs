//! `SimplexMesh`: an immutable, rank-local shard of a triangle or tetrahedron mesh.
//!
//! # Expected invariants
//! - Each cell's vertices are stored **sorted by global id**. Local edge, face
//!   and facet numbering therefore depends only on global ids and is identical
//!   on every rank holding the cell or one of its sub-entities.
//! - Edges store their endpoints sorted by global id.
//! - In 2D the faces are the cells (face `c` is cell `c`); in 3D faces are the
//!   unique vertex triples of cell faces.
//! - Facets are the `tdim - 1` entities: edges in 2D, faces in 3D.
//! - `shared_vertices` maps a local vertex to the sorted list of *other* ranks
//!   holding a copy. A vertex is owned by the lowest rank holding it.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::metrics::{edge_length, simplex_measure, to_point3};
use crate::mesh_error::MeshRefineError;
use crate::topology::cell_type::{CellType, TETRAHEDRON_FACES};
use crate::topology::point::GlobalId;
use std::collections::{BTreeMap, HashMap};

/// Rank-local simplicial mesh with derived edge/face connectivity.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SimplexMesh {
    cell_type: CellType,
    gdim: usize,
    vertex_ids: Vec<GlobalId>,
    coordinates: Vec<f64>,
    cell_ids: Vec<GlobalId>,
    cells: Vec<usize>,
    edges: Vec<[usize; 2]>,
    cell_edges: Vec<usize>,
    faces: Vec<[usize; 3]>,
    face_edges: Vec<[usize; 3]>,
    cell_faces: Vec<usize>,
    shared_vertices: BTreeMap<usize, Vec<usize>>,
    #[serde(skip)]
    vertex_lookup: HashMap<GlobalId, usize>,
    #[serde(skip)]
    edge_lookup: HashMap<[usize; 2], usize>,
}

impl SimplexMesh {
    /// Build a mesh from vertex global ids, flat coordinates (`gdim` per
    /// vertex) and flat cell connectivity (`tdim + 1` local vertex indices per
    /// cell). Cell global ids default to the local cell index.
    ///
    /// # Errors
    /// - [`MeshRefineError::UnsupportedDimension`] unless `tdim` is 2 or 3.
    /// - [`MeshRefineError::UnsupportedGeometricDimension`] unless `tdim <= gdim <= 3`.
    /// - [`MeshRefineError::IndexBufferMismatch`] for coordinate or cell buffers
    ///   of the wrong length.
    /// - [`MeshRefineError::VertexOutOfRange`], [`MeshRefineError::DegenerateCell`]
    ///   and [`MeshRefineError::DuplicateGlobalId`] for bad connectivity.
    pub fn new(
        tdim: usize,
        gdim: usize,
        vertex_ids: Vec<GlobalId>,
        coordinates: Vec<f64>,
        cells: &[usize],
    ) -> Result<Self, MeshRefineError> {
        let cell_type = CellType::from_tdim(tdim)?;
        if gdim < tdim || gdim > 3 {
            return Err(MeshRefineError::UnsupportedGeometricDimension { tdim, gdim });
        }
        let num_vertices = vertex_ids.len();
        if coordinates.len() != num_vertices * gdim {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "vertex coordinates",
                expected: num_vertices * gdim,
                found: coordinates.len(),
            });
        }
        let nv = cell_type.num_vertices();
        if cells.len() % nv != 0 {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "cell connectivity",
                expected: cells.len().div_ceil(nv) * nv,
                found: cells.len(),
            });
        }

        let mut vertex_lookup = HashMap::with_capacity(num_vertices);
        for (v, &gid) in vertex_ids.iter().enumerate() {
            if vertex_lookup.insert(gid, v).is_some() {
                return Err(MeshRefineError::DuplicateGlobalId(gid));
            }
        }

        let num_cells = cells.len() / nv;
        let mut sorted = Vec::with_capacity(cells.len());
        for (c, cell) in cells.chunks_exact(nv).enumerate() {
            let mut cell = cell.to_vec();
            for &vertex in &cell {
                if vertex >= num_vertices {
                    return Err(MeshRefineError::VertexOutOfRange {
                        cell: c,
                        vertex,
                        num_vertices,
                    });
                }
            }
            cell.sort_by_key(|&v| vertex_ids[v]);
            if cell.windows(2).any(|w| w[0] == w[1]) {
                return Err(MeshRefineError::DegenerateCell(c));
            }
            sorted.extend(cell);
        }

        let mut mesh = SimplexMesh {
            cell_type,
            gdim,
            vertex_ids,
            coordinates,
            cell_ids: (0..num_cells as u64).map(GlobalId::new).collect(),
            cells: sorted,
            edges: Vec::new(),
            cell_edges: Vec::new(),
            faces: Vec::new(),
            face_edges: Vec::new(),
            cell_faces: Vec::new(),
            shared_vertices: BTreeMap::new(),
            vertex_lookup,
            edge_lookup: HashMap::new(),
        };
        mesh.compute_entities();
        Ok(mesh)
    }

    /// Replace the default cell global ids.
    pub fn with_cell_ids(mut self, cell_ids: Vec<GlobalId>) -> Result<Self, MeshRefineError> {
        if cell_ids.len() != self.num_cells() {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "cell global ids",
                expected: self.num_cells(),
                found: cell_ids.len(),
            });
        }
        let mut seen = std::collections::HashSet::with_capacity(cell_ids.len());
        for &gid in &cell_ids {
            if !seen.insert(gid) {
                return Err(MeshRefineError::DuplicateGlobalId(gid));
            }
        }
        self.cell_ids = cell_ids;
        Ok(self)
    }

    /// Attach shared-vertex metadata: local vertex → other ranks holding it.
    pub fn with_shared_vertices(
        mut self,
        shared: BTreeMap<usize, Vec<usize>>,
    ) -> Result<Self, MeshRefineError> {
        let num_vertices = self.num_vertices();
        let mut cleaned = BTreeMap::new();
        for (v, mut ranks) in shared {
            if v >= num_vertices {
                return Err(MeshRefineError::VertexOutOfRange {
                    cell: usize::MAX,
                    vertex: v,
                    num_vertices,
                });
            }
            ranks.sort_unstable();
            ranks.dedup();
            if !ranks.is_empty() {
                cleaned.insert(v, ranks);
            }
        }
        self.shared_vertices = cleaned;
        Ok(self)
    }

    fn compute_entities(&mut self) {
        let nv = self.cell_type.num_vertices();
        let num_cells = self.num_cells();
        let mut edges = Vec::new();
        let mut edge_lookup: HashMap<[usize; 2], usize> = HashMap::new();
        let mut cell_edges = Vec::with_capacity(num_cells * self.cell_type.num_edges());

        for c in 0..num_cells {
            let cell = &self.cells[c * nv..(c + 1) * nv];
            for &[a, b] in self.cell_type.edge_vertices() {
                let key = [cell[a], cell[b]];
                let next = edges.len();
                let e = *edge_lookup.entry(key).or_insert(next);
                if e == next {
                    edges.push(key);
                }
                cell_edges.push(e);
            }
        }

        let mut faces = Vec::new();
        let mut face_edges = Vec::new();
        let mut cell_faces = Vec::new();
        match self.cell_type {
            CellType::Triangle => {
                cell_faces.extend(0..num_cells);
            }
            CellType::Tetrahedron => {
                let mut face_lookup: HashMap<[usize; 3], usize> = HashMap::new();
                for c in 0..num_cells {
                    let cell = &self.cells[c * nv..(c + 1) * nv];
                    for local in TETRAHEDRON_FACES {
                        let key = [cell[local[0]], cell[local[1]], cell[local[2]]];
                        let next = faces.len();
                        let f = *face_lookup.entry(key).or_insert(next);
                        if f == next {
                            let [p, q, r] = key;
                            faces.push(key);
                            face_edges.push([
                                edge_lookup[&[q, r]],
                                edge_lookup[&[p, r]],
                                edge_lookup[&[p, q]],
                            ]);
                        }
                        cell_faces.push(f);
                    }
                }
            }
        }

        self.edges = edges;
        self.edge_lookup = edge_lookup;
        self.cell_edges = cell_edges;
        self.faces = faces;
        self.face_edges = face_edges;
        self.cell_faces = cell_faces;
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Topological dimension (2 or 3).
    pub fn tdim(&self) -> usize {
        self.cell_type.tdim()
    }

    /// Geometric dimension (length of each coordinate tuple).
    pub fn gdim(&self) -> usize {
        self.gdim
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_ids.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_faces(&self) -> usize {
        match self.cell_type {
            CellType::Triangle => self.num_cells(),
            CellType::Tetrahedron => self.faces.len(),
        }
    }

    pub fn num_facets(&self) -> usize {
        match self.cell_type {
            CellType::Triangle => self.num_edges(),
            CellType::Tetrahedron => self.faces.len(),
        }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len() / self.cell_type.num_vertices()
    }

    /// Number of entities of dimension `dim`.
    pub fn num_entities(&self, dim: usize) -> Option<usize> {
        match dim {
            0 => Some(self.num_vertices()),
            1 => Some(self.num_edges()),
            2 => Some(self.num_faces()),
            3 if self.tdim() == 3 => Some(self.num_cells()),
            _ => None,
        }
    }

    /// Local vertices of a cell, sorted by global id.
    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        let nv = self.cell_type.num_vertices();
        &self.cells[cell * nv..(cell + 1) * nv]
    }

    /// Mesh edge index of each local cell edge.
    pub fn cell_edges(&self, cell: usize) -> &[usize] {
        let ne = self.cell_type.num_edges();
        &self.cell_edges[cell * ne..(cell + 1) * ne]
    }

    /// Mesh face index of each local cell face (2D: the cell itself).
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        match self.cell_type {
            CellType::Triangle => std::slice::from_ref(&self.cell_faces[cell]),
            CellType::Tetrahedron => &self.cell_faces[cell * 4..cell * 4 + 4],
        }
    }

    /// Mesh facet index of each local cell facet (facet `i` is opposite vertex `i`).
    pub fn cell_facets(&self, cell: usize) -> &[usize] {
        match self.cell_type {
            CellType::Triangle => self.cell_edges(cell),
            CellType::Tetrahedron => self.cell_faces(cell),
        }
    }

    pub fn edge_vertices(&self, edge: usize) -> [usize; 2] {
        self.edges[edge]
    }

    /// Face vertices, sorted by global id.
    pub fn face_vertices(&self, face: usize) -> [usize; 3] {
        match self.cell_type {
            CellType::Triangle => {
                let v = self.cell_vertices(face);
                [v[0], v[1], v[2]]
            }
            CellType::Tetrahedron => self.faces[face],
        }
    }

    /// Face edges; face edge `k` is opposite face vertex `k`.
    pub fn face_edges(&self, face: usize) -> [usize; 3] {
        match self.cell_type {
            CellType::Triangle => {
                let e = self.cell_edges(face);
                [e[0], e[1], e[2]]
            }
            CellType::Tetrahedron => self.face_edges[face],
        }
    }

    pub fn facet_vertices(&self, facet: usize) -> &[usize] {
        match self.cell_type {
            CellType::Triangle => &self.edges[facet],
            CellType::Tetrahedron => &self.faces[facet],
        }
    }

    /// Mesh edges of a facet.
    pub fn facet_edges(&self, facet: usize) -> Vec<usize> {
        match self.cell_type {
            CellType::Triangle => vec![facet],
            CellType::Tetrahedron => self.face_edges[facet].to_vec(),
        }
    }

    pub fn vertex_coordinates(&self, vertex: usize) -> &[f64] {
        &self.coordinates[vertex * self.gdim..(vertex + 1) * self.gdim]
    }

    /// All coordinates, `gdim` per vertex.
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn vertex_global(&self, vertex: usize) -> GlobalId {
        self.vertex_ids[vertex]
    }

    pub fn vertex_global_ids(&self) -> &[GlobalId] {
        &self.vertex_ids
    }

    /// Local index of the vertex with global id `gid`, if present on this rank.
    pub fn vertex_index(&self, gid: GlobalId) -> Option<usize> {
        self.vertex_lookup.get(&gid).copied()
    }

    pub fn cell_global(&self, cell: usize) -> GlobalId {
        self.cell_ids[cell]
    }

    pub fn cell_global_ids(&self) -> &[GlobalId] {
        &self.cell_ids
    }

    /// Largest vertex global id on this rank (0 for an empty shard).
    pub fn max_vertex_global(&self) -> u64 {
        self.vertex_ids.iter().map(|g| g.get()).max().unwrap_or(0)
    }

    /// Global identity of an edge: its endpoint ids in increasing order.
    pub fn edge_key(&self, edge: usize) -> (GlobalId, GlobalId) {
        let [a, b] = self.edges[edge];
        (self.vertex_ids[a], self.vertex_ids[b])
    }

    /// Local edge with the given endpoint ids, if present on this rank.
    pub fn edge_index(&self, a: GlobalId, b: GlobalId) -> Option<usize> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let va = self.vertex_index(a)?;
        let vb = self.vertex_index(b)?;
        self.edge_lookup.get(&[va, vb]).copied()
    }

    pub fn edge_length(&self, edge: usize) -> f64 {
        let [a, b] = self.edges[edge];
        edge_length(self.vertex_coordinates(a), self.vertex_coordinates(b))
    }

    /// Area (2D) or volume (3D) of a cell.
    pub fn cell_measure(&self, cell: usize) -> Result<f64, MeshRefineError> {
        let vertices: Vec<[f64; 3]> = self
            .cell_vertices(cell)
            .iter()
            .map(|&v| to_point3(self.vertex_coordinates(v)))
            .collect();
        simplex_measure(self.cell_type, &vertices)
    }

    pub fn shared_vertices(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.shared_vertices
    }

    /// Other ranks holding a copy of `vertex` (empty when not shared).
    pub fn vertex_sharers(&self, vertex: usize) -> &[usize] {
        self.shared_vertices
            .get(&vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when `rank` is the lowest rank holding `vertex`.
    pub fn owns_vertex(&self, vertex: usize, rank: usize) -> bool {
        self.vertex_sharers(vertex).iter().all(|&r| r > rank)
    }
}

impl DebugInvariants for SimplexMesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SimplexMesh");
    }

    fn validate_invariants(&self) -> Result<(), MeshRefineError> {
        if self.coordinates.len() != self.num_vertices() * self.gdim {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "vertex coordinates",
                expected: self.num_vertices() * self.gdim,
                found: self.coordinates.len(),
            });
        }
        if self.cell_ids.len() != self.num_cells() {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "cell global ids",
                expected: self.num_cells(),
                found: self.cell_ids.len(),
            });
        }
        for c in 0..self.num_cells() {
            let cell = self.cell_vertices(c);
            if cell.windows(2).any(|w| self.vertex_ids[w[0]] >= self.vertex_ids[w[1]]) {
                return Err(MeshRefineError::InvariantViolation(format!(
                    "cell {c} vertices are not sorted by global id"
                )));
            }
            for (local, &e) in self.cell_edges(c).iter().enumerate() {
                let [a, b] = self.cell_type.edge_vertices()[local];
                if self.edges[e] != [cell[a], cell[b]] {
                    return Err(MeshRefineError::InvariantViolation(format!(
                        "cell {c} local edge {local} does not match mesh edge {e}"
                    )));
                }
            }
        }
        for f in 0..self.num_faces() {
            let verts = self.face_vertices(f);
            for (k, &e) in self.face_edges(f).iter().enumerate() {
                if self.edges[e].contains(&verts[k]) {
                    return Err(MeshRefineError::InvariantViolation(format!(
                        "face {f} edge {k} is not opposite face vertex {k}"
                    )));
                }
            }
        }
        Ok(())
    }
}
