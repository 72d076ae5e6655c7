#![allow(dead_code)]
use mesh_refine::algs::communicator::ThreadComm;
use mesh_refine::topology::mesh::SimplexMesh;
use mesh_refine::topology::point::GlobalId;
use std::collections::{BTreeMap, BTreeSet};

pub fn gid(u: u64) -> GlobalId {
    GlobalId::new(u)
}

pub fn gids(n: u64) -> Vec<GlobalId> {
    (0..n).map(GlobalId::new).collect()
}

/// Run `f` once per rank of an `n`-rank thread world and collect the results
/// in rank order.
pub fn run_world<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&ThreadComm) -> T + Sync,
{
    let world = ThreadComm::world(n);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = world.iter().map(|comm| s.spawn(move || f(comm))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

pub fn total_measure(mesh: &SimplexMesh) -> f64 {
    (0..mesh.num_cells())
        .map(|c| mesh.cell_measure(c).unwrap())
        .sum()
}

/// Global vertex ids of every cell, sorted.
pub fn cell_keys(mesh: &SimplexMesh) -> Vec<Vec<GlobalId>> {
    (0..mesh.num_cells())
        .map(|c| {
            mesh.cell_vertices(c)
                .iter()
                .map(|&v| mesh.vertex_global(v))
                .collect()
        })
        .collect()
}

/// Every cell as the sorted tuple of its vertex coordinate bit patterns.
/// Independent of vertex numbering, so serial and parallel runs compare.
pub fn geometric_cells(mesh: &SimplexMesh) -> BTreeSet<Vec<Vec<u64>>> {
    (0..mesh.num_cells())
        .map(|c| {
            let mut pts: Vec<Vec<u64>> = mesh
                .cell_vertices(c)
                .iter()
                .map(|&v| {
                    mesh.vertex_coordinates(v)
                        .iter()
                        .map(|x| x.to_bits())
                        .collect()
                })
                .collect();
            pts.sort();
            pts
        })
        .collect()
}

/// Number of cells using each facet.
pub fn facet_use(mesh: &SimplexMesh) -> Vec<usize> {
    let mut uses = vec![0; mesh.num_facets()];
    for c in 0..mesh.num_cells() {
        for &f in mesh.cell_facets(c) {
            uses[f] += 1;
        }
    }
    uses
}

/// Total length (2D) or area (3D) of the facets used by a single cell.
pub fn boundary_measure(mesh: &SimplexMesh) -> f64 {
    let uses = facet_use(mesh);
    (0..mesh.num_facets())
        .filter(|&f| uses[f] == 1)
        .map(|f| facet_measure(mesh, f))
        .sum()
}

fn facet_measure(mesh: &SimplexMesh, facet: usize) -> f64 {
    let p: Vec<[f64; 3]> = mesh
        .facet_vertices(facet)
        .iter()
        .map(|&v| {
            let mut x = [0.0; 3];
            for (d, c) in x.iter_mut().zip(mesh.vertex_coordinates(v)) {
                *d = *c;
            }
            x
        })
        .collect();
    let sub = |a: [f64; 3], b: [f64; 3]| [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    if p.len() == 2 {
        let d = sub(p[1], p[0]);
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    } else {
        let u = sub(p[1], p[0]);
        let w = sub(p[2], p[0]);
        let n = [
            u[1] * w[2] - u[2] * w[1],
            u[2] * w[0] - u[0] * w[2],
            u[0] * w[1] - u[1] * w[0],
        ];
        0.5 * (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt()
    }
}

/// Union of rank-local vertex tables; panics if two ranks disagree on the
/// coordinates of a global id.
pub fn merged_vertices(meshes: &[&SimplexMesh]) -> BTreeMap<GlobalId, Vec<u64>> {
    let mut merged = BTreeMap::new();
    for mesh in meshes {
        for v in 0..mesh.num_vertices() {
            let bits: Vec<u64> = mesh
                .vertex_coordinates(v)
                .iter()
                .map(|x| x.to_bits())
                .collect();
            let prev = merged.insert(mesh.vertex_global(v), bits.clone());
            if let Some(prev) = prev {
                assert_eq!(prev, bits, "vertex {} differs across ranks", mesh.vertex_global(v));
            }
        }
    }
    merged
}

/// Rebuild one mesh from rank-local pieces (vertices merged by global id).
pub fn merge_meshes(meshes: &[&SimplexMesh]) -> SimplexMesh {
    let merged = merged_vertices(meshes);
    let ids: Vec<GlobalId> = merged.keys().copied().collect();
    let index: BTreeMap<GlobalId, usize> = ids.iter().enumerate().map(|(i, g)| (*g, i)).collect();
    let coords: Vec<f64> = merged
        .values()
        .flat_map(|bits| bits.iter().map(|b| f64::from_bits(*b)))
        .collect();
    let mut cells = Vec::new();
    for mesh in meshes {
        for c in 0..mesh.num_cells() {
            cells.extend(mesh.cell_vertices(c).iter().map(|&v| index[&mesh.vertex_global(v)]));
        }
    }
    let first = meshes[0];
    SimplexMesh::new(first.tdim(), first.gdim(), ids, coords, &cells).unwrap()
}
