//! Basic simplex mesh generators for structured boxes and a sphere shell.
//!
//! Vertex global ids are the vertex indices; cell global ids are the cell
//! indices. Use [`crate::algs::distribute::extract_shard`] to split a generated
//! mesh across ranks.

use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;

fn build_mesh(
    tdim: usize,
    gdim: usize,
    vertex_coords: &[Vec<f64>],
    cells: &[usize],
) -> Result<SimplexMesh, MeshRefineError> {
    if let Some(coord) = vertex_coords.iter().find(|c| c.len() != gdim) {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "generated vertex coordinates",
            expected: gdim,
            found: coord.len(),
        });
    }
    let ids = (0..vertex_coords.len() as u64).map(GlobalId::new).collect();
    SimplexMesh::new(tdim, gdim, ids, vertex_coords.concat(), cells)
}

/// Structured triangle mesh of `[min, max]` with `nx`×`ny` squares, each cut
/// along its `(i, j)`–`(i + 1, j + 1)` diagonal.
pub fn structured_box_2d(
    nx: usize,
    ny: usize,
    min: [f64; 2],
    max: [f64; 2],
) -> Result<SimplexMesh, MeshRefineError> {
    if nx == 0 || ny == 0 {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "box subdivisions",
            expected: 1,
            found: 0,
        });
    }
    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        let y = min[1] + dy * j as f64;
        for i in 0..=nx {
            let x = min[0] + dx * i as f64;
            vertices.push(vec![x, y]);
        }
    }

    let mut cells = Vec::with_capacity(6 * nx * ny);
    let row_stride = nx + 1;
    for j in 0..ny {
        for i in 0..nx {
            let v0 = j * row_stride + i;
            let v1 = v0 + 1;
            let v3 = v0 + row_stride;
            let v2 = v3 + 1;
            cells.extend([v0, v1, v2]);
            cells.extend([v0, v2, v3]);
        }
    }

    build_mesh(2, 2, &vertices, &cells)
}

/// Structured tetrahedron mesh of `[min, max]` with `nx`×`ny`×`nz` cubes,
/// each split into six tetrahedra around its main diagonal (Kuhn split,
/// conforming between neighbouring cubes).
pub fn structured_box_3d(
    nx: usize,
    ny: usize,
    nz: usize,
    min: [f64; 3],
    max: [f64; 3],
) -> Result<SimplexMesh, MeshRefineError> {
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "box subdivisions",
            expected: 1,
            found: 0,
        });
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let dz = (max[2] - min[2]) / nz as f64;
    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        let z = min[2] + dz * k as f64;
        for j in 0..=ny {
            let y = min[1] + dy * j as f64;
            for i in 0..=nx {
                let x = min[0] + dx * i as f64;
                vertices.push(vec![x, y, z]);
            }
        }
    }

    let mut cells = Vec::with_capacity(24 * nx * ny * nz);
    let row_stride = nx + 1;
    let slab_stride = row_stride * (ny + 1);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v0 = k * slab_stride + j * row_stride + i;
                let v1 = v0 + 1;
                let v3 = v0 + row_stride;
                let v2 = v3 + 1;
                let v4 = v0 + slab_stride;
                let v5 = v4 + 1;
                let v7 = v4 + row_stride;
                let v6 = v7 + 1;
                for tet in [
                    [v0, v1, v2, v6],
                    [v0, v2, v3, v6],
                    [v0, v3, v7, v6],
                    [v0, v7, v4, v6],
                    [v0, v4, v5, v6],
                    [v0, v5, v1, v6],
                ] {
                    cells.extend(tet);
                }
            }
        }
    }

    build_mesh(3, 3, &vertices, &cells)
}

/// Triangulated sphere of `radius` (a 2D mesh embedded in 3D) with `n_lat`
/// latitude bands and `n_lon` longitude divisions.
pub fn sphere_shell(radius: f64, n_lat: usize, n_lon: usize) -> Result<SimplexMesh, MeshRefineError> {
    if radius <= 0.0 || n_lat < 2 || n_lon < 3 {
        return Err(MeshRefineError::InvariantViolation(
            "sphere shell requires radius > 0, n_lat >= 2 and n_lon >= 3".into(),
        ));
    }

    let mut vertices = vec![vec![0.0, 0.0, radius]];
    let mut rings: Vec<Vec<usize>> = Vec::new();
    for lat in 1..n_lat {
        let theta = std::f64::consts::PI * (lat as f64) / (n_lat as f64);
        let (sin_t, cos_t) = theta.sin_cos();
        let mut ring = Vec::with_capacity(n_lon);
        for lon in 0..n_lon {
            let phi = std::f64::consts::TAU * (lon as f64) / (n_lon as f64);
            ring.push(vertices.len());
            vertices.push(vec![
                radius * sin_t * phi.cos(),
                radius * sin_t * phi.sin(),
                radius * cos_t,
            ]);
        }
        rings.push(ring);
    }
    let bottom = vertices.len();
    vertices.push(vec![0.0, 0.0, -radius]);

    let mut cells = Vec::new();
    if let Some(first) = rings.first() {
        for lon in 0..n_lon {
            cells.extend([0, first[lon], first[(lon + 1) % n_lon]]);
        }
    }
    for band in rings.windows(2) {
        let (a, b) = (&band[0], &band[1]);
        for lon in 0..n_lon {
            let next = (lon + 1) % n_lon;
            cells.extend([a[lon], b[lon], b[next]]);
            cells.extend([a[lon], b[next], a[next]]);
        }
    }
    if let Some(last) = rings.last() {
        for lon in 0..n_lon {
            cells.extend([last[lon], bottom, last[(lon + 1) % n_lon]]);
        }
    }

    build_mesh(2, 3, &vertices, &cells)
}
