mod util;

use mesh_refine::prelude::*;
use mesh_refine::topology::refine::longest_edge::face_long_edge;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;
use std::collections::{BTreeMap, BTreeSet};
use util::{
    boundary_measure, geometric_cells, gid, merge_meshes, merged_vertices, run_world,
    total_measure,
};

const COORDS: [[f64; 3]; 5] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
];

/// Two tetrahedra glued along the equilateral face {1, 2, 3}. Each rank
/// holds one of them and lists its vertices in a different order.
fn glued_tetrahedra(rank: usize) -> SimplexMesh {
    let (order, cell_id): ([u64; 4], u64) = match rank {
        0 => ([3, 1, 0, 2], 0),
        _ => ([4, 2, 3, 1], 1),
    };
    let coords: Vec<f64> = order
        .iter()
        .flat_map(|&g| COORDS[g as usize])
        .collect();
    let shared: BTreeMap<usize, Vec<usize>> = order
        .iter()
        .enumerate()
        .filter(|&(_, g)| (1..=3).contains(g))
        .map(|(v, _)| (v, vec![1 - rank]))
        .collect();
    SimplexMesh::new(3, 3, order.map(gid).to_vec(), coords, &[0, 1, 2, 3])
        .unwrap()
        .with_cell_ids(vec![gid(cell_id)])
        .unwrap()
        .with_shared_vertices(shared)
        .unwrap()
}

fn block_parts(n: usize, size: usize) -> Vec<usize> {
    (0..n).map(|c| c * size / n).collect()
}

#[test]
#[serial]
fn shared_face_tie_is_broken_identically() {
    let results = run_world(2, |comm| {
        let mesh = glued_tetrahedra(comm.rank());
        let long_edge = face_long_edge(&mesh).unwrap();
        let shared_face: BTreeSet<_> = [gid(1), gid(2), gid(3)].into();
        let face = (0..mesh.num_faces())
            .find(|&f| {
                let vs: BTreeSet<_> = mesh
                    .face_vertices(f)
                    .iter()
                    .map(|&v| mesh.vertex_global(v))
                    .collect();
                vs == shared_face
            })
            .unwrap();
        let chosen = mesh.edge_key(long_edge[face]);

        let marker = EntityMarker::cells(&mesh, vec![comm.rank() == 0]);
        let out = refine_marked(
            &mesh,
            comm,
            &marker,
            RefineOptions::default().with_invariant_checks(true),
        )
        .unwrap();
        (mesh, chosen, out)
    });

    // all three sides have length sqrt(2); the side opposite vertex 3 wins
    assert_eq!(results[0].1, (gid(1), gid(2)));
    assert_eq!(results[1].1, (gid(1), gid(2)));

    let (in0, _, out0) = &results[0];
    let (in1, _, out1) = &results[1];
    for key in [(gid(1), gid(2)), (gid(1), gid(3)), (gid(2), gid(3))] {
        assert_eq!(out0.edge_to_new_vertex[&key], out1.edge_to_new_vertex[&key]);
    }
    assert_eq!(out0.mesh.num_cells(), 8);
    assert!(out1.parent_cell.iter().all(|&p| p == gid(1)));
    assert!(out1.mesh.num_cells() > 1);

    let before = merge_meshes(&[in0, in1]);
    let after = merge_meshes(&[&out0.mesh, &out1.mesh]);
    assert!((boundary_measure(&before) - boundary_measure(&after)).abs() < 1e-12);
    assert!((total_measure(&before) - total_measure(&after)).abs() < 1e-12);
}

fn refine_distributed(
    global: &SimplexMesh,
    size: usize,
    marks: &[bool],
    options: RefineOptions,
) -> Vec<RefinedMesh> {
    let parts = block_parts(global.num_cells(), size);
    run_world(size, |comm| {
        let shard = extract_shard(global, &parts, comm.rank()).unwrap();
        let local_marks = shard
            .cell_global_ids()
            .iter()
            .map(|g| marks[g.get() as usize])
            .collect();
        let marker = EntityMarker::cells(&shard, local_marks);
        refine_marked(&shard, comm, &marker, options).unwrap()
    })
}

fn union_of_cells(parts: &[RefinedMesh]) -> BTreeSet<Vec<Vec<u64>>> {
    parts
        .iter()
        .flat_map(|p| geometric_cells(&p.mesh))
        .collect()
}

#[test]
#[serial]
fn uniform_parallel_matches_serial() {
    for global in [
        structured_box_2d(3, 2, [0.0, 0.0], [3.0, 2.0]).unwrap(),
        structured_box_3d(2, 1, 1, [0.0; 3], [2.0, 1.0, 1.0]).unwrap(),
    ] {
        let serial = refine(&global, &NoComm, RefineOptions::default()).unwrap();
        let parts = block_parts(global.num_cells(), 3);
        let results = run_world(3, |comm| {
            let shard = extract_shard(&global, &parts, comm.rank()).unwrap();
            refine(&shard, comm, RefineOptions::default()).unwrap()
        });
        assert_eq!(union_of_cells(&results), geometric_cells(&serial.mesh));
        let total: usize = results.iter().map(|r| r.mesh.num_cells()).sum();
        assert_eq!(total, serial.mesh.num_cells());
    }
}

#[test]
#[serial]
fn selective_parallel_matches_serial() {
    let mut rng = SmallRng::seed_from_u64(7);
    let global = structured_box_3d(2, 2, 1, [0.0; 3], [2.0, 2.0, 1.0]).unwrap();
    for _ in 0..4 {
        let marks: Vec<bool> = (0..global.num_cells()).map(|_| rng.gen_bool(0.2)).collect();
        let marker = EntityMarker::cells(&global, marks.clone());
        let serial = refine_marked(&global, &NoComm, &marker, RefineOptions::default()).unwrap();
        for size in [2, 3] {
            let results = refine_distributed(&global, size, &marks, RefineOptions::default());
            assert_eq!(union_of_cells(&results), geometric_cells(&serial.mesh));
        }
    }
}

#[test]
#[serial]
fn new_ids_are_globally_consistent() {
    let global = structured_box_2d(4, 3, [0.0, 0.0], [4.0, 3.0]).unwrap();
    let marks: Vec<bool> = (0..global.num_cells()).map(|c| c % 5 == 0).collect();
    let results = refine_distributed(&global, 3, &marks, RefineOptions::default());
    let meshes: Vec<&SimplexMesh> = results.iter().map(|r| &r.mesh).collect();

    // a global id names the same point on every rank, and distinct points
    // have distinct ids
    let merged = merged_vertices(&meshes);
    let points: BTreeSet<_> = merged.values().collect();
    assert_eq!(points.len(), merged.len());

    // cell ids are 0..n without gaps
    let mut cell_ids: Vec<u64> = meshes
        .iter()
        .flat_map(|m| m.cell_global_ids().iter().map(|g| g.get()))
        .collect();
    cell_ids.sort_unstable();
    assert_eq!(cell_ids, (0..cell_ids.len() as u64).collect::<Vec<_>>());

    // ranks holding the same bisected edge agree on its midpoint
    let mut midpoints: BTreeMap<(GlobalId, GlobalId), GlobalId> = BTreeMap::new();
    for r in &results {
        for (key, mid) in &r.edge_to_new_vertex {
            if let Some(prev) = midpoints.insert(*key, *mid) {
                assert_eq!(prev, *mid);
            }
        }
    }

    let merged_mesh = merge_meshes(&meshes);
    assert!((boundary_measure(&merged_mesh) - 14.0).abs() < 1e-12);
    assert!((total_measure(&merged_mesh) - 12.0).abs() < 1e-12);
}

#[test]
#[serial]
fn parent_facets_stay_local_without_redistribution() {
    let global = structured_box_2d(2, 2, [0.0, 0.0], [1.0, 1.0]).unwrap();
    let marks = vec![true; global.num_cells()];
    let results = refine_distributed(&global, 2, &marks, RefineOptions::default());
    let parts = block_parts(global.num_cells(), 2);
    for (rank, r) in results.iter().enumerate() {
        let shard = extract_shard(&global, &parts, rank).unwrap();
        let facets = r.parent_facet.as_ref().unwrap();
        assert_eq!(facets.len(), r.mesh.num_facets());
        for f in 0..shard.num_facets() {
            assert!(facets.contains(&Some(f)));
        }
        let parents: BTreeSet<_> = r.parent_cell.iter().collect();
        let owned: BTreeSet<_> = shard.cell_global_ids().iter().collect();
        assert_eq!(parents, owned);
    }
}

#[test]
#[serial]
fn redistribution_moves_cells_into_blocks() {
    let global = structured_box_2d(3, 3, [0.0, 0.0], [3.0, 3.0]).unwrap();
    let serial = refine(&global, &NoComm, RefineOptions::default()).unwrap();
    // everything starts on rank 0
    let parts = vec![0; global.num_cells()];
    let results = run_world(3, |comm| {
        let shard = extract_shard(&global, &parts, comm.rank()).unwrap();
        refine(&shard, comm, RefineOptions::default().with_redistribute(true)).unwrap()
    });

    let total = serial.mesh.num_cells();
    assert_eq!(union_of_cells(&results), geometric_cells(&serial.mesh));
    for (rank, r) in results.iter().enumerate() {
        assert!(r.parent_facet.is_none());
        assert!(r.mesh.num_cells() > 0);
        assert_eq!(r.parent_cell.len(), r.mesh.num_cells());
        for id in r.mesh.cell_global_ids() {
            assert_eq!(id.get() as usize * 3 / total, rank);
        }
    }

    // shared-vertex metadata is symmetric
    for (rank, r) in results.iter().enumerate() {
        for (&v, sharers) in r.mesh.shared_vertices() {
            let g = r.mesh.vertex_global(v);
            for &s in sharers {
                let other = &results[s].mesh;
                let ov = other.vertex_index(g).unwrap();
                assert!(other.vertex_sharers(ov).contains(&rank));
            }
        }
    }
}

#[test]
#[serial]
fn serial_world_of_one_rank_matches_nocomm() {
    let global = structured_box_2d(2, 1, [0.0, 0.0], [2.0, 1.0]).unwrap();
    let serial = refine(&global, &NoComm, RefineOptions::default()).unwrap();
    let results = run_world(1, |comm| refine(&global, comm, RefineOptions::default()).unwrap());
    assert_eq!(
        serde_json::to_string(&results[0].mesh).unwrap(),
        serde_json::to_string(&serial.mesh).unwrap()
    );
    assert_eq!(results[0].parent_cell, serial.parent_cell);
}
