//! Map child facets back to the parent facet they lie on.
//!
//! A child facet lies on a parent facet when all of its vertices are among
//! the parent facet's vertices plus the midpoints of the parent facet's
//! bisected edges. Facets cutting through the interior of a parent cell have
//! no parent facet.

use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;
use std::collections::{BTreeMap, BTreeSet};

/// For every facet of `child`, the index of the `parent` facet it lies on.
///
/// `parent_cell[c]` is the local index in `parent` of child cell `c`;
/// `new_vertices` maps bisected parent edges to their midpoint vertex ids.
/// A child facet is assigned the first parent facet (in the parent cell's
/// local facet order) that contains it.
pub fn map_parent_facets(
    parent: &SimplexMesh,
    child: &SimplexMesh,
    parent_cell: &[usize],
    new_vertices: &BTreeMap<usize, GlobalId>,
) -> Result<Vec<Option<usize>>, MeshRefineError> {
    if parent_cell.len() != child.num_cells() {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "child parent cells",
            expected: child.num_cells(),
            found: parent_cell.len(),
        });
    }
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); parent.num_cells()];
    for (c, &p) in parent_cell.iter().enumerate() {
        children
            .get_mut(p)
            .ok_or(MeshRefineError::IndexBufferMismatch {
                what: "parent cell index",
                expected: parent.num_cells(),
                found: p,
            })?
            .push(c);
    }

    let mut result = vec![None; child.num_facets()];
    for (p, kids) in children.iter().enumerate() {
        if kids.is_empty() {
            continue;
        }
        let facet_sets: Vec<(usize, BTreeSet<GlobalId>)> = parent
            .cell_facets(p)
            .iter()
            .map(|&f| (f, facet_vertex_set(parent, f, new_vertices)))
            .collect();

        for &c in kids {
            for &cf in child.cell_facets(c) {
                if result[cf].is_some() {
                    continue;
                }
                result[cf] = facet_sets
                    .iter()
                    .find(|(_, set)| {
                        child
                            .facet_vertices(cf)
                            .iter()
                            .all(|&v| set.contains(&child.vertex_global(v)))
                    })
                    .map(|(f, _)| *f);
            }
        }
    }
    Ok(result)
}

fn facet_vertex_set(
    mesh: &SimplexMesh,
    facet: usize,
    new_vertices: &BTreeMap<usize, GlobalId>,
) -> BTreeSet<GlobalId> {
    let mut set: BTreeSet<GlobalId> = mesh
        .facet_vertices(facet)
        .iter()
        .map(|&v| mesh.vertex_global(v))
        .collect();
    set.extend(
        mesh.facet_edges(facet)
            .iter()
            .filter_map(|e| new_vertices.get(e).copied()),
    );
    set
}
