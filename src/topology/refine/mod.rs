//! Plaza longest-edge refinement of distributed triangle and tetrahedron meshes.
//!
//! # Expected invariants
//! - The input mesh is an ordered [`SimplexMesh`]: every rank holding an
//!   entity numbers it locally the same way, and shared vertices are listed in
//!   its shared-vertex metadata.
//! - Every rank calls the same entry point with the same options; the calls
//!   are collective.
//! - After marking, the marked edges satisfy the longest-edge rule on every
//!   face (guaranteed by [`rules::enforce_rules`] for selective refinement,
//!   trivially for uniform refinement).
//!
//! The output carries the parent global id of every new cell and, when
//! computable, the parent facet of every new facet.

pub mod bisect;
pub mod longest_edge;
pub mod parallel;
pub mod parent_facets;
pub mod rules;

use crate::algs::communicator::Communicator;
use crate::algs::distribute::{BlockPartitioner, CellPartitioner};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshRefineError;
use crate::topology::marker::EntityMarker;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;
use bisect::get_simplices;
use longest_edge::face_long_edge;
use parallel::ParallelRefinement;
use parent_facets::map_parent_facets;
use rules::{check_closure, enforce_rules};
use std::collections::BTreeMap;

/// Settings for one refinement call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefineOptions {
    /// Move the new cells with a [`CellPartitioner`] (parallel runs only).
    pub redistribute: bool,
    /// Compute `parent_facet`. Ignored (with a warning) when redistributing.
    pub compute_parent_facets: bool,
    /// Validate the closure invariant and the new mesh before returning.
    pub check_invariants: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            redistribute: false,
            compute_parent_facets: true,
            check_invariants: false,
        }
    }
}

impl RefineOptions {
    pub fn with_redistribute(mut self, redistribute: bool) -> Self {
        self.redistribute = redistribute;
        self
    }

    pub fn with_parent_facets(mut self, compute: bool) -> Self {
        self.compute_parent_facets = compute;
        self
    }

    pub fn with_invariant_checks(mut self, check: bool) -> Self {
        self.check_invariants = check;
        self
    }
}

/// Counters describing one refinement call on this rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RefinementStats {
    /// Marked edges on this rank after closure.
    pub marked_edges: usize,
    /// Closure rounds (0 for uniform refinement).
    pub closure_rounds: usize,
    pub cells_in: usize,
    pub cells_out: usize,
}

/// A refined mesh and its lineage.
#[derive(Clone, Debug)]
pub struct RefinedMesh {
    pub mesh: SimplexMesh,
    /// Global id of the parent of each new cell.
    pub parent_cell: Vec<GlobalId>,
    /// Input facet index under each new facet; `None` inside a parent cell.
    /// Absent when not requested or when the cells were redistributed.
    pub parent_facet: Option<Vec<Option<usize>>>,
    /// New vertex of every bisected edge, keyed by the edge's endpoint ids.
    pub edge_to_new_vertex: BTreeMap<(GlobalId, GlobalId), GlobalId>,
    pub stats: RefinementStats,
}

/// Uniform refinement: every edge is bisected.
pub fn refine<C: Communicator>(
    mesh: &SimplexMesh,
    comm: &C,
    options: RefineOptions,
) -> Result<RefinedMesh, MeshRefineError> {
    let long_edge = face_long_edge(mesh)?;
    let mut refinement = ParallelRefinement::new(mesh, comm)?;
    refinement.mark_all();
    do_refine(refinement, &long_edge, options, 0, &BlockPartitioner)
}

/// Selective refinement of the edges selected by `marker`, extended to a
/// conforming set by the longest-edge rule.
pub fn refine_marked<C: Communicator>(
    mesh: &SimplexMesh,
    comm: &C,
    marker: &EntityMarker,
    options: RefineOptions,
) -> Result<RefinedMesh, MeshRefineError> {
    refine_marked_with_partitioner(mesh, comm, marker, options, &BlockPartitioner)
}

/// [`refine_marked`] with a caller-chosen partitioner for redistribution.
pub fn refine_marked_with_partitioner<C: Communicator>(
    mesh: &SimplexMesh,
    comm: &C,
    marker: &EntityMarker,
    options: RefineOptions,
    partitioner: &dyn CellPartitioner,
) -> Result<RefinedMesh, MeshRefineError> {
    let long_edge = face_long_edge(mesh)?;
    let mut refinement = ParallelRefinement::new(mesh, comm)?;
    refinement.mark_entities(marker)?;
    let report = enforce_rules(&mut refinement, &long_edge)?;
    crate::debug_invariants!(
        check_closure(mesh, refinement.marked(), &long_edge),
        "closure"
    );
    do_refine(refinement, &long_edge, options, report.rounds, partitioner)
}

/// Selective refinement that never redistributes, for callers that need the
/// edge → new vertex relation to line up with the input partition.
pub fn refine_with_relation<C: Communicator>(
    mesh: &SimplexMesh,
    comm: &C,
    marker: &EntityMarker,
    compute_parent_facets: bool,
) -> Result<RefinedMesh, MeshRefineError> {
    let options = RefineOptions::default()
        .with_redistribute(false)
        .with_parent_facets(compute_parent_facets);
    refine_marked(mesh, comm, marker, options)
}

fn do_refine<C: Communicator>(
    mut refinement: ParallelRefinement<'_, C>,
    long_edge: &[usize],
    options: RefineOptions,
    closure_rounds: usize,
    partitioner: &dyn CellPartitioner,
) -> Result<RefinedMesh, MeshRefineError> {
    let mesh = refinement.mesh();
    let comm = refinement.comm();
    if options.check_invariants {
        check_closure(mesh, refinement.marked(), long_edge)?;
    }

    refinement.create_new_vertices()?;
    let new_vertices = refinement.edge_to_new_vertex().clone();
    let edge_to_new_vertex = refinement.edge_key_to_new_vertex();

    let children = bisect_cells(mesh, refinement.marked(), &new_vertices, long_edge)?;
    let mut parent_local = Vec::new();
    for (cell, kids) in children.into_iter().enumerate() {
        log::trace!("cell {} -> {} children", mesh.cell_global(cell), kids.len());
        for kid in kids {
            refinement.new_cell(kid, mesh.cell_global(cell));
            parent_local.push(cell);
        }
    }
    let marked_edges = refinement.num_marked();

    let serial = comm.is_serial();
    let (new_mesh, parent_cell) = if serial {
        refinement.build_local()?
    } else {
        refinement.partition(options.redistribute, partitioner)?
    };

    let parent_facet = match (options.compute_parent_facets, serial || !options.redistribute) {
        (true, true) => Some(map_parent_facets(
            mesh,
            &new_mesh,
            &parent_local,
            &new_vertices,
        )?),
        (true, false) => {
            log::warn!("parent facets are not computed for redistributed meshes");
            None
        }
        (false, _) => None,
    };

    if options.check_invariants {
        new_mesh.validate_invariants()?;
    }
    new_mesh.debug_assert_invariants();

    let stats = RefinementStats {
        marked_edges,
        closure_rounds,
        cells_in: mesh.num_cells(),
        cells_out: new_mesh.num_cells(),
    };
    log::info!(
        "rank {}: refined {} cells into {} ({} marked edges, {} closure rounds)",
        comm.rank(),
        stats.cells_in,
        stats.cells_out,
        stats.marked_edges,
        stats.closure_rounds
    );
    Ok(RefinedMesh {
        mesh: new_mesh,
        parent_cell,
        parent_facet,
        edge_to_new_vertex,
        stats,
    })
}

type Children = Vec<Vec<GlobalId>>;

/// Children of every cell, in cell order.
fn bisect_cells(
    mesh: &SimplexMesh,
    marked: &[bool],
    new_vertices: &BTreeMap<usize, GlobalId>,
    long_edge: &[usize],
) -> Result<Vec<Children>, MeshRefineError> {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        (0..mesh.num_cells())
            .into_par_iter()
            .map(|c| cell_children(mesh, marked, new_vertices, long_edge, c))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..mesh.num_cells())
            .map(|c| cell_children(mesh, marked, new_vertices, long_edge, c))
            .collect()
    }
}

/// Children of one cell as vertex global ids. Nodes are indexed
/// `[vertices][edge midpoints]`, matching [`bisect`].
fn cell_children(
    mesh: &SimplexMesh,
    marked: &[bool],
    new_vertices: &BTreeMap<usize, GlobalId>,
    long_edge: &[usize],
    cell: usize,
) -> Result<Children, MeshRefineError> {
    let edges = mesh.cell_edges(cell);
    let mut nodes: Vec<Option<GlobalId>> = mesh
        .cell_vertices(cell)
        .iter()
        .map(|&v| Some(mesh.vertex_global(v)))
        .collect();
    let markers: Vec<bool> = edges.iter().map(|&e| marked[e]).collect();
    if !markers.contains(&true) {
        return Ok(vec![nodes.into_iter().flatten().collect()]);
    }

    for (&e, &m) in edges.iter().zip(&markers) {
        let node = if m {
            Some(
                new_vertices
                    .get(&e)
                    .copied()
                    .ok_or(MeshRefineError::MissingNewVertex { edge: e })?,
            )
        } else {
            None
        };
        nodes.push(node);
    }

    // longest edge of each cell facet (2D: of the cell) as a local edge index
    let local_long = mesh
        .cell_faces(cell)
        .iter()
        .map(|&f| {
            let le = long_edge[f];
            edges
                .iter()
                .position(|&e| e == le)
                .ok_or(MeshRefineError::EdgeNotInCell { cell, edge: le })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let simplices =
        get_simplices(&markers, &local_long, mesh.tdim()).map_err(|err| err.at_cell(cell))?;
    simplices
        .into_iter()
        .map(|simplex| {
            simplex
                .into_iter()
                .map(|n| {
                    nodes[n].ok_or_else(|| {
                        MeshRefineError::InvariantViolation(format!(
                            "cell {cell}: child uses the midpoint of unmarked local edge {}",
                            n - mesh.tdim() - 1
                        ))
                    })
                })
                .collect()
        })
        .collect()
}
