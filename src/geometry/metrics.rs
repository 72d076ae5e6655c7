//! Geometry metrics for simplex cells.
//!
//! Coordinates are passed as slices of length `gdim` (2 or 3). Every function
//! here evaluates the same floating-point expression regardless of argument
//! order where that matters for cross-rank agreement: [`edge_length`] and
//! [`midpoint`] are symmetric in their endpoints.

use crate::mesh_error::MeshRefineError;
use crate::topology::cell_type::CellType;

/// Euclidean distance between two points.
///
/// Each squared component difference is identical under swapping `a` and `b`,
/// so ranks that see the endpoints in different orders agree bitwise.
pub fn edge_length(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Componentwise midpoint of two points.
pub fn midpoint(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| 0.5 * (x + y)).collect()
}

/// Unsigned area (triangle) or volume (tetrahedron) of a simplex.
///
/// Triangles embedded in 3D report the magnitude of the area vector.
pub fn simplex_measure(cell_type: CellType, vertices: &[[f64; 3]]) -> Result<f64, MeshRefineError> {
    if vertices.len() != cell_type.num_vertices() {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "simplex vertices",
            expected: cell_type.num_vertices(),
            found: vertices.len(),
        });
    }
    Ok(match cell_type {
        CellType::Triangle => {
            0.5 * norm(cross(
                sub(vertices[1], vertices[0]),
                sub(vertices[2], vertices[0]),
            ))
        }
        CellType::Tetrahedron => {
            signed_volume(vertices[0], vertices[1], vertices[2], vertices[3]).abs()
        }
    })
}

/// Pad a `gdim`-length coordinate slice to 3 components.
pub fn to_point3(coords: &[f64]) -> [f64; 3] {
    let mut p = [0.0; 3];
    for (dst, src) in p.iter_mut().zip(coords) {
        *dst = *src;
    }
    p
}

fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ad = sub(d, a);
    dot(ab, cross(ac, ad)) / 6.0
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
