//! Plaza subdivision templates.
//!
//! Children are returned as tuples of *cell-local nodes*: nodes `0..=tdim`
//! are the cell's vertices and node `tdim + 1 + e` is the midpoint of local
//! edge `e`. In 2D local edge `i` is opposite vertex `i`; in 3D the local
//! edges follow [`TETRAHEDRON_EDGES`] and local facet `i` is opposite vertex
//! `i`.

use crate::mesh_error::MeshRefineError;
use crate::topology::cell_type::TETRAHEDRON_EDGES;

/// Children of a cell given its marked local edges and the local longest edge
/// of each of its facets (one entry in 2D: the cell itself; four in 3D).
///
/// # Errors
/// - [`MeshRefineError::UnsupportedDimension`] unless `tdim` is 2 or 3.
/// - [`MeshRefineError::IndexBufferMismatch`] when `marked` or `longest_edge`
///   have the wrong length for `tdim`.
/// - [`MeshRefineError::LongestEdgeNotMarked`] when a facet with a marked edge
///   does not have its longest edge marked. `cell` is reported as 0; callers
///   substitute the real cell.
pub fn get_simplices(
    marked: &[bool],
    longest_edge: &[usize],
    tdim: usize,
) -> Result<Vec<Vec<usize>>, MeshRefineError> {
    match tdim {
        2 => {
            check_len("triangle longest edges", 1, longest_edge.len())?;
            Ok(get_triangles(marked, longest_edge[0])?
                .into_iter()
                .map(Vec::from)
                .collect())
        }
        3 => {
            check_len("tetrahedron longest edges", 4, longest_edge.len())?;
            let le = [
                longest_edge[0],
                longest_edge[1],
                longest_edge[2],
                longest_edge[3],
            ];
            Ok(get_tetrahedra(marked, &le)?
                .into_iter()
                .map(Vec::from)
                .collect())
        }
        other => Err(MeshRefineError::UnsupportedDimension(other)),
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), MeshRefineError> {
    if expected != found {
        return Err(MeshRefineError::IndexBufferMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Split a triangle across its longest edge, then split each half again if
/// its other edge is marked. Yields 2, 3 or 4 triangles.
pub fn get_triangles(marked: &[bool], longest_edge: usize) -> Result<Vec<[usize; 3]>, MeshRefineError> {
    check_len("triangle marked edges", 3, marked.len())?;
    if longest_edge >= 3 {
        return Err(MeshRefineError::EdgeNotInCell {
            cell: 0,
            edge: longest_edge,
        });
    }
    if !marked[longest_edge] {
        return Err(MeshRefineError::LongestEdgeNotMarked {
            cell: 0,
            edge: longest_edge,
        });
    }

    // v0, v1 are the ends of the longest edge, v2 is opposite it
    let v0 = (longest_edge + 1) % 3;
    let v1 = (longest_edge + 2) % 3;
    let v2 = longest_edge;
    let (e0, e1, e2) = (v0 + 3, v1 + 3, v2 + 3);

    let mut children = Vec::with_capacity(4);
    if marked[v0] {
        children.push([e2, v2, e0]);
        children.push([e2, e0, v1]);
    } else {
        children.push([e2, v2, v1]);
    }
    if marked[v1] {
        children.push([e2, v2, e1]);
        children.push([e2, e1, v0]);
    } else {
        children.push([e2, v2, v0]);
    }
    Ok(children)
}

/// Symmetric adjacency over the ten local nodes of a tetrahedron, one bit
/// row per node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ConnectivityGraph {
    rows: [u16; 10],
}

impl ConnectivityGraph {
    fn connect(&mut self, a: usize, b: usize) {
        self.rows[a] |= 1 << b;
        self.rows[b] |= 1 << a;
    }

    fn connected(&self, a: usize, b: usize) -> bool {
        self.rows[a] & (1 << b) != 0
    }

    /// All 4-cliques `i < j < p < q`, in lexicographic order.
    fn four_cliques(&self) -> Vec<[usize; 4]> {
        let mut cliques = Vec::new();
        for i in 0..10 {
            for j in (i + 1)..10 {
                if !self.connected(i, j) {
                    continue;
                }
                let common: Vec<usize> = ((j + 1)..10)
                    .filter(|&k| self.connected(i, k) && self.connected(j, k))
                    .collect();
                for (n, &p) in common.iter().enumerate() {
                    for &q in &common[n + 1..] {
                        if self.connected(p, q) {
                            cliques.push([i, j, p, q]);
                        }
                    }
                }
            }
        }
        cliques
    }
}

/// Subdivide a tetrahedron. `longest_edge[f]` is the local longest edge of
/// the facet opposite vertex `f`. Yields between 1 and 8 tetrahedra.
pub fn get_tetrahedra(
    marked: &[bool],
    longest_edge: &[usize; 4],
) -> Result<Vec<[usize; 4]>, MeshRefineError> {
    check_len("tetrahedron marked edges", 6, marked.len())?;
    for (facet, &le) in longest_edge.iter().enumerate() {
        if le >= 6 || TETRAHEDRON_EDGES[le].contains(&facet) {
            return Err(MeshRefineError::EdgeNotInCell { cell: 0, edge: le });
        }
        let facet_marked = (0..6)
            .filter(|&e| !TETRAHEDRON_EDGES[e].contains(&facet))
            .any(|e| marked[e]);
        if facet_marked && !marked[le] {
            return Err(MeshRefineError::LongestEdgeNotMarked { cell: 0, edge: le });
        }
    }

    let mut conn = ConnectivityGraph::default();
    for (ei, &[v0, v1]) in TETRAHEDRON_EDGES.iter().enumerate() {
        if !marked[ei] {
            conn.connect(v0, v1);
            continue;
        }
        let mid = ei + 4;
        conn.connect(v0, mid);
        conn.connect(v1, mid);

        // the two facets containing ei are opposite the vertices of the opposite edge
        let e_opp = 5 - ei;
        for j in 0..2 {
            let fj = TETRAHEDRON_EDGES[e_opp][j];
            let le_j = longest_edge[fj];
            if le_j == ei {
                let fk = TETRAHEDRON_EDGES[e_opp][1 - j];
                conn.connect(fk, mid);
                if longest_edge[fk] == ei && marked[e_opp] {
                    conn.connect(mid, e_opp + 4);
                }
            } else {
                conn.connect(le_j + 4, mid);
            }
        }
    }

    Ok(conn.four_cliques())
}
