mod util;

use mesh_refine::prelude::*;
use util::{boundary_measure, cell_keys, facet_use, gid, gids, total_measure};

fn right_triangle() -> SimplexMesh {
    // hypotenuse 1-2 is the longest edge
    SimplexMesh::new(2, 2, gids(3), vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], &[0, 1, 2]).unwrap()
}

fn unit_tetrahedron() -> SimplexMesh {
    SimplexMesh::new(
        3,
        3,
        gids(4),
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        &[0, 1, 2, 3],
    )
    .unwrap()
}

#[test]
fn triangle_longest_edge_only_gives_two_children() {
    let mesh = right_triangle();
    let hyp = mesh.edge_index(gid(1), gid(2)).unwrap();
    let marker = EntityMarker::from_fn(&mesh, 1, |e| e == hyp).unwrap();
    let out = refine_marked(&mesh, &NoComm, &marker, RefineOptions::default()).unwrap();

    assert_eq!(out.mesh.num_cells(), 2);
    let mid = out.edge_to_new_vertex[&(gid(1), gid(2))];
    assert_eq!(mid, gid(3));
    for cell in cell_keys(&out.mesh) {
        assert!(cell.contains(&mid));
        assert!(cell.contains(&gid(0)));
    }
    assert_eq!(out.parent_cell, vec![gid(0), gid(0)]);
    assert!((total_measure(&out.mesh) - 0.5).abs() < 1e-15);
}

#[test]
fn triangle_all_edges_gives_four_children() {
    let mesh = right_triangle();
    let out = refine(&mesh, &NoComm, RefineOptions::default()).unwrap();
    assert_eq!(out.mesh.num_cells(), 4);
    assert_eq!(out.mesh.num_vertices(), 6);

    // the hypotenuse midpoint is the apex of every child; the two short
    // edges are split from it, leaving the right-angle corner in two children
    let cells = cell_keys(&out.mesh);
    let mid = out.edge_to_new_vertex[&(gid(1), gid(2))];
    assert!(cells.iter().all(|c| c.contains(&mid)));
    let uses = |v: GlobalId| cells.iter().filter(|c| c.contains(&v)).count();
    assert_eq!(uses(gid(0)), 2);
    assert_eq!(uses(gid(1)), 1);
    assert_eq!(uses(gid(2)), 1);
    for short in [(gid(0), gid(1)), (gid(0), gid(2))] {
        let m = out.edge_to_new_vertex[&short];
        assert_eq!(uses(m), 2);
    }
    for c in 0..out.mesh.num_cells() {
        assert!((out.mesh.cell_measure(c).unwrap() - 0.125).abs() < 1e-15);
    }
}

#[test]
fn tetrahedron_all_edges_gives_eight_children() {
    let mesh = unit_tetrahedron();
    let out = refine(&mesh, &NoComm, RefineOptions::default()).unwrap();
    assert_eq!(out.mesh.num_cells(), 8);
    // four original vertices and six midpoints, each present exactly once
    assert_eq!(out.mesh.num_vertices(), 10);
    for v in 0..4 {
        let copies = out
            .mesh
            .vertex_global_ids()
            .iter()
            .filter(|&&g| g == gid(v))
            .count();
        assert_eq!(copies, 1);
        assert!(cell_keys(&out.mesh).iter().any(|c| c.contains(&gid(v))));
    }
    assert!((total_measure(&out.mesh) - 1.0 / 6.0).abs() < 1e-15);
    assert!(out.parent_cell.iter().all(|&p| p == gid(0)));
}

#[test]
fn marking_a_private_edge_bisects_the_shared_longest_edge() {
    // unit square cut along 0-3; edge 0-1 belongs to cell 0 only
    let mesh = structured_box_2d(1, 1, [0.0, 0.0], [1.0, 1.0]).unwrap();
    let bottom = mesh.edge_index(gid(0), gid(1)).unwrap();
    let marker = EntityMarker::from_fn(&mesh, 1, |e| e == bottom).unwrap();
    let out = refine_marked(
        &mesh,
        &NoComm,
        &marker,
        RefineOptions::default().with_invariant_checks(true),
    )
    .unwrap();

    assert!(out.edge_to_new_vertex.contains_key(&(gid(0), gid(3))));
    assert!(out.edge_to_new_vertex.contains_key(&(gid(0), gid(1))));
    assert_eq!(out.stats.marked_edges, 2);
    assert_eq!(out.stats.closure_rounds, 2);
    // cell 0: both marked edges -> 3 children; cell 1: diagonal -> 2 children
    assert_eq!(out.mesh.num_cells(), 5);
    assert_eq!(out.parent_cell.iter().filter(|&&p| p == gid(0)).count(), 3);
    assert_eq!(out.parent_cell.iter().filter(|&&p| p == gid(1)).count(), 2);
    // no hanging node: the boundary is unchanged
    assert!((boundary_measure(&out.mesh) - 4.0).abs() < 1e-12);
    assert!(facet_use(&out.mesh).iter().all(|&n| n == 1 || n == 2));
}

#[test]
fn parent_facets_cover_every_input_facet() {
    let mesh = structured_box_2d(2, 2, [0.0, 0.0], [1.0, 1.0]).unwrap();
    let marker = EntityMarker::cells(&mesh, (0..mesh.num_cells()).map(|c| c % 3 == 0).collect());
    let out = refine_marked(&mesh, &NoComm, &marker, RefineOptions::default()).unwrap();
    let parent_facet = out.parent_facet.as_ref().unwrap();
    assert_eq!(parent_facet.len(), out.mesh.num_facets());
    for f in 0..mesh.num_facets() {
        assert!(parent_facet.contains(&Some(f)), "input facet {f} has no child");
    }
    // unmapped facets lie inside a parent cell, so they are shared by two children of it
    let uses = facet_use(&out.mesh);
    for (f, parent) in parent_facet.iter().enumerate() {
        if parent.is_none() {
            assert_eq!(uses[f], 2);
        }
    }
}

#[test]
fn parent_facets_can_be_skipped() {
    let mesh = structured_box_3d(1, 1, 1, [0.0; 3], [1.0; 3]).unwrap();
    let out = refine(
        &mesh,
        &NoComm,
        RefineOptions::default().with_parent_facets(false),
    )
    .unwrap();
    assert!(out.parent_facet.is_none());
    assert_eq!(out.stats.cells_in, 6);
    assert_eq!(out.stats.cells_out, 48);
}

#[test]
fn repeated_refinement_is_identical() {
    let mesh = structured_box_3d(2, 1, 1, [0.0; 3], [2.0, 1.0, 1.0]).unwrap();
    let marker = EntityMarker::vertices((0..mesh.num_vertices()).map(|v| v == 0).collect());
    let a = refine_marked(&mesh, &NoComm, &marker, RefineOptions::default()).unwrap();
    let b = refine_marked(&mesh, &NoComm, &marker, RefineOptions::default()).unwrap();
    assert_eq!(
        serde_json::to_string(&a.mesh).unwrap(),
        serde_json::to_string(&b.mesh).unwrap()
    );
    assert_eq!(a.parent_cell, b.parent_cell);
    assert_eq!(a.parent_facet, b.parent_facet);
}

#[test]
fn refining_twice_keeps_area() {
    let mesh = sphere_shell(1.0, 4, 8).unwrap();
    let area = total_measure(&mesh);
    let once = refine(&mesh, &NoComm, RefineOptions::default()).unwrap();
    let twice = refine(&once.mesh, &NoComm, RefineOptions::default()).unwrap();
    assert_eq!(twice.mesh.num_cells(), 16 * mesh.num_cells());
    // flat subdivision of a polyhedral surface preserves its area
    assert!((total_measure(&twice.mesh) - area).abs() < 1e-12);
    // parents of the second pass are cells of the first
    let first_ids: std::collections::BTreeSet<_> =
        once.mesh.cell_global_ids().iter().copied().collect();
    assert!(twice.parent_cell.iter().all(|p| first_ids.contains(p)));
}

#[test]
fn unsupported_dimension_is_rejected() {
    assert_eq!(
        SimplexMesh::new(1, 1, gids(2), vec![0.0, 1.0], &[0, 1]).unwrap_err(),
        MeshRefineError::UnsupportedDimension(1)
    );
}

#[test]
fn bad_marker_is_rejected() {
    let mesh = right_triangle();
    let marker = EntityMarker::edges(vec![true]);
    assert!(matches!(
        refine_marked(&mesh, &NoComm, &marker, RefineOptions::default()),
        Err(MeshRefineError::MarkerSizeMismatch { .. })
    ));
}
