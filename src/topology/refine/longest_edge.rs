//! Longest edge of every face.
//!
//! Ties in length are broken by the global id of the face vertex opposite
//! the candidate edge (larger wins). Edge lengths are computed from endpoint
//! coordinates ordered by global id, so every rank holding a face selects the
//! same edge without communicating.

use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;

/// Mesh edge index of the longest edge of each face (2D: of each cell).
pub fn face_long_edge(mesh: &SimplexMesh) -> Result<Vec<usize>, MeshRefineError> {
    (0..mesh.num_faces())
        .map(|face| longest_edge_of_face(mesh, face))
        .collect()
}

fn longest_edge_of_face(mesh: &SimplexMesh, face: usize) -> Result<usize, MeshRefineError> {
    let vertices = mesh.face_vertices(face);
    let edges = mesh.face_edges(face);

    let mut best: Option<(usize, f64, GlobalId)> = None;
    for (k, &edge) in edges.iter().enumerate() {
        let length = mesh.edge_length(edge);
        let key = mesh.vertex_global(vertices[k]);
        match best {
            None => best = Some((edge, length, key)),
            Some((_, max_len, max_key)) => {
                if length > max_len || (length == max_len && key > max_key) {
                    best = Some((edge, length, key));
                } else if length == max_len && key == max_key {
                    return Err(MeshRefineError::AmbiguousLongestEdge { face });
                }
            }
        }
    }
    best.map(|(edge, _, _)| edge)
        .ok_or(MeshRefineError::AmbiguousLongestEdge { face })
}
