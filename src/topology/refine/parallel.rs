//! `ParallelRefinement`: distributed bookkeeping for one refinement call.
//!
//! Holds the marked-edge set of a rank-local mesh, keeps it consistent
//! with the other ranks sharing edges, numbers the new midpoint vertices and
//! collects the child cells until the new mesh is assembled.
//!
//! # Collectives
//! [`ParallelRefinement::new`], [`sync_marks`](ParallelRefinement::sync_marks),
//! [`create_new_vertices`](ParallelRefinement::create_new_vertices),
//! [`build_local`](ParallelRefinement::build_local) and
//! [`partition`](ParallelRefinement::partition) must be called by every rank,
//! in the same order.

use crate::algs::communicator::Communicator;
use crate::algs::distribute::{
    assemble_local, rebuild_shared_vertices, redistribute_cells, CellPartitioner, CellRecord,
};
use crate::algs::exchange::exchange_records;
use crate::algs::wire::{WireEdgeKey, WireEdgeVertex};
use crate::geometry::metrics::midpoint;
use crate::mesh_error::MeshRefineError;
use crate::topology::marker::EntityMarker;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;
use std::collections::BTreeMap;

/// New mesh produced by a finalize step, with the parent global id of each
/// of its cells.
pub type AssembledMesh = (SimplexMesh, Vec<GlobalId>);

pub struct ParallelRefinement<'a, C: Communicator> {
    mesh: &'a SimplexMesh,
    comm: &'a C,
    marked: Vec<bool>,
    /// local edge -> other ranks holding the same edge
    shared_edges: BTreeMap<usize, Vec<usize>>,
    /// local edge -> global id of its midpoint vertex
    new_vertices: BTreeMap<usize, GlobalId>,
    new_cells: Vec<CellRecord>,
}

impl<'a, C: Communicator> ParallelRefinement<'a, C> {
    /// Start refining `mesh`. Collective: finds the ranks sharing each edge.
    pub fn new(mesh: &'a SimplexMesh, comm: &'a C) -> Result<Self, MeshRefineError> {
        let shared_edges = if comm.is_serial() {
            BTreeMap::new()
        } else {
            find_shared_edges(mesh, comm)?
        };
        log::debug!(
            "rank {}: {} of {} edges shared",
            comm.rank(),
            shared_edges.len(),
            mesh.num_edges()
        );
        Ok(Self {
            mesh,
            comm,
            marked: vec![false; mesh.num_edges()],
            shared_edges,
            new_vertices: BTreeMap::new(),
            new_cells: Vec::new(),
        })
    }

    pub fn mesh(&self) -> &'a SimplexMesh {
        self.mesh
    }

    pub fn comm(&self) -> &'a C {
        self.comm
    }

    pub fn mark_all(&mut self) {
        self.marked.fill(true);
    }

    pub fn mark(&mut self, edge: usize) -> Result<(), MeshRefineError> {
        let num_edges = self.marked.len();
        let slot = self
            .marked
            .get_mut(edge)
            .ok_or(MeshRefineError::EdgeOutOfRange { edge, num_edges })?;
        *slot = true;
        Ok(())
    }

    /// Mark the edges selected by `marker`: edges touching a marked vertex,
    /// marked edges, or every edge of a marked face or cell.
    pub fn mark_entities(&mut self, marker: &EntityMarker) -> Result<(), MeshRefineError> {
        marker.validate(self.mesh)?;
        let mesh = self.mesh;
        match (marker.dim(), mesh.tdim()) {
            (0, _) => {
                for e in 0..mesh.num_edges() {
                    if mesh.edge_vertices(e).iter().any(|&v| marker.is_marked(v)) {
                        self.marked[e] = true;
                    }
                }
            }
            (1, _) => {
                for (slot, &m) in self.marked.iter_mut().zip(marker.values()) {
                    *slot |= m;
                }
            }
            (2, 3) => {
                for f in (0..mesh.num_faces()).filter(|&f| marker.is_marked(f)) {
                    for e in mesh.face_edges(f) {
                        self.marked[e] = true;
                    }
                }
            }
            (_, _) => {
                for c in (0..mesh.num_cells()).filter(|&c| marker.is_marked(c)) {
                    for &e in mesh.cell_edges(c) {
                        self.marked[e] = true;
                    }
                }
            }
        }
        Ok(())
    }

    /// Mark through a predicate over the entities of dimension `dim`.
    pub fn mark_by<F>(&mut self, dim: usize, predicate: F) -> Result<(), MeshRefineError>
    where
        F: FnMut(usize) -> bool,
    {
        let marker = EntityMarker::from_fn(self.mesh, dim, predicate)?;
        self.mark_entities(&marker)
    }

    pub fn is_marked(&self, edge: usize) -> bool {
        self.marked.get(edge).copied().unwrap_or(false)
    }

    /// Local indices (`0..num_edges` of the cell type) of the marked edges of `cell`.
    pub fn marked_edge_list(&self, cell: usize) -> Vec<usize> {
        self.mesh
            .cell_edges(cell)
            .iter()
            .enumerate()
            .filter(|&(_, &e)| self.marked[e])
            .map(|(local, _)| local)
            .collect()
    }

    pub fn num_marked(&self) -> usize {
        self.marked.iter().filter(|&&m| m).count()
    }

    pub fn marked(&self) -> &[bool] {
        &self.marked
    }

    /// Other ranks holding `edge`.
    pub fn edge_sharers(&self, edge: usize) -> &[usize] {
        self.shared_edges
            .get(&edge)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// OR the marks of shared edges across ranks. Returns how many local
    /// marks changed. Collective.
    pub fn sync_marks(&mut self) -> Result<usize, MeshRefineError> {
        if self.comm.is_serial() {
            return Ok(0);
        }
        let mut outgoing: BTreeMap<usize, Vec<WireEdgeKey>> = BTreeMap::new();
        for (&edge, ranks) in &self.shared_edges {
            if !self.marked[edge] {
                continue;
            }
            let (a, b) = self.mesh.edge_key(edge);
            for &rank in ranks {
                outgoing
                    .entry(rank)
                    .or_default()
                    .push(WireEdgeKey::new(a.get(), b.get()));
            }
        }

        let mut changed = 0;
        for (rank, keys) in exchange_records(self.comm, outgoing)? {
            for key in keys {
                let edge = self.lookup_edge(rank, key)?;
                if !self.marked[edge] {
                    self.marked[edge] = true;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn lookup_edge(&self, rank: usize, key: WireEdgeKey) -> Result<usize, MeshRefineError> {
        self.mesh
            .edge_index(GlobalId::new(key.a()), GlobalId::new(key.b()))
            .ok_or_else(|| MeshRefineError::Comm {
                neighbor: rank,
                message: format!("unknown edge ({}, {})", key.a(), key.b()),
            })
    }

    /// Number every marked edge's midpoint vertex. New ids continue after the
    /// largest vertex id on any rank; each edge is numbered by the lowest rank
    /// holding it and the id is sent to the other holders. Collective.
    ///
    /// Marks must already agree across ranks (after [`sync_marks`](Self::sync_marks)
    /// or a uniform [`mark_all`](Self::mark_all)).
    pub fn create_new_vertices(&mut self) -> Result<(), MeshRefineError> {
        let rank = self.comm.rank();
        let base = self.comm.all_reduce_max(self.mesh.max_vertex_global())? + 1;

        let owned: Vec<usize> = (0..self.marked.len())
            .filter(|&e| self.marked[e] && self.edge_sharers(e).iter().all(|&r| r > rank))
            .collect();
        let counts = self.comm.all_gather(owned.len() as u64)?;
        let offset: u64 = counts[..rank].iter().sum();

        let mut new_vertices = BTreeMap::new();
        let mut outgoing: BTreeMap<usize, Vec<WireEdgeVertex>> = BTreeMap::new();
        for (k, &edge) in owned.iter().enumerate() {
            let id = base + offset + k as u64;
            new_vertices.insert(edge, GlobalId::new(id));
            let (a, b) = self.mesh.edge_key(edge);
            for &peer in self.edge_sharers(edge) {
                outgoing
                    .entry(peer)
                    .or_default()
                    .push(WireEdgeVertex::new(a.get(), b.get(), id));
            }
        }

        for (peer, records) in exchange_records(self.comm, outgoing)? {
            for record in records {
                let edge = self.lookup_edge(peer, record.key)?;
                if !self.marked[edge] {
                    return Err(MeshRefineError::InvariantViolation(format!(
                        "rank {peer} numbered edge {edge} which is unmarked on rank {rank}"
                    )));
                }
                new_vertices.insert(edge, GlobalId::new(record.vertex()));
            }
        }

        if let Some(edge) = (0..self.marked.len())
            .find(|&e| self.marked[e] && !new_vertices.contains_key(&e))
        {
            return Err(MeshRefineError::MissingNewVertex { edge });
        }
        log::debug!(
            "rank {rank}: {} new vertices, {} numbered here",
            new_vertices.len(),
            owned.len()
        );
        self.new_vertices = new_vertices;
        Ok(())
    }

    /// Local edge → new vertex id, filled by
    /// [`create_new_vertices`](Self::create_new_vertices).
    pub fn edge_to_new_vertex(&self) -> &BTreeMap<usize, GlobalId> {
        &self.new_vertices
    }

    /// Same map keyed by the edge's endpoint global ids.
    pub fn edge_key_to_new_vertex(&self) -> BTreeMap<(GlobalId, GlobalId), GlobalId> {
        self.new_vertices
            .iter()
            .map(|(&e, &v)| (self.mesh.edge_key(e), v))
            .collect()
    }

    /// Queue a child cell (vertex global ids) of the parent with global id `parent`.
    pub fn new_cell(&mut self, vertices: Vec<GlobalId>, parent: GlobalId) {
        self.new_cells.push(CellRecord {
            id: GlobalId::new(self.new_cells.len() as u64),
            parent,
            vertices,
        });
    }

    pub fn num_new_cells(&self) -> usize {
        self.new_cells.len()
    }

    /// Input vertices followed by the new midpoint vertices in local edge order.
    fn all_vertices(&self) -> Vec<(GlobalId, Vec<f64>)> {
        let mesh = self.mesh;
        let mut vertices: Vec<(GlobalId, Vec<f64>)> = (0..mesh.num_vertices())
            .map(|v| (mesh.vertex_global(v), mesh.vertex_coordinates(v).to_vec()))
            .collect();
        vertices.extend(self.new_vertices.iter().map(|(&edge, &id)| {
            let [a, b] = mesh.edge_vertices(edge);
            (
                id,
                midpoint(mesh.vertex_coordinates(a), mesh.vertex_coordinates(b)),
            )
        }));
        vertices
    }

    /// Assemble the new mesh on a single rank.
    pub fn build_local(self) -> Result<AssembledMesh, MeshRefineError> {
        let vertices = self.all_vertices();
        assemble_local(self.mesh.tdim(), self.mesh.gdim(), &vertices, &self.new_cells)
    }

    /// Assemble the distributed new mesh. Cells get consecutive global ids
    /// across ranks (rank order, then creation order). With `redistribute`
    /// the cells move to the ranks chosen by `partitioner`; otherwise every
    /// rank keeps its own children. Shared-vertex metadata is rebuilt either
    /// way. Collective.
    pub fn partition(
        mut self,
        redistribute: bool,
        partitioner: &dyn CellPartitioner,
    ) -> Result<AssembledMesh, MeshRefineError> {
        let rank = self.comm.rank();
        let counts = self.comm.all_gather(self.new_cells.len() as u64)?;
        let offset: u64 = counts[..rank].iter().sum();
        for (k, cell) in self.new_cells.iter_mut().enumerate() {
            cell.id = GlobalId::new(offset + k as u64);
        }

        let tdim = self.mesh.tdim();
        let gdim = self.mesh.gdim();
        let vertices = self.all_vertices();
        let (mesh, parents) = if redistribute {
            let (vertices, cells) =
                redistribute_cells(self.comm, partitioner, gdim, &vertices, self.new_cells)?;
            assemble_local(tdim, gdim, &vertices, &cells)?
        } else {
            assemble_local(tdim, gdim, &vertices, &self.new_cells)?
        };

        let shared = rebuild_shared_vertices(self.comm, &mesh)?;
        Ok((mesh.with_shared_vertices(shared)?, parents))
    }
}

/// Exact edge sharing: offer every edge to the ranks sharing both of its
/// endpoints and keep the offers that name a local edge.
fn find_shared_edges<C: Communicator>(
    mesh: &SimplexMesh,
    comm: &C,
) -> Result<BTreeMap<usize, Vec<usize>>, MeshRefineError> {
    let mut offers: BTreeMap<usize, Vec<WireEdgeKey>> = BTreeMap::new();
    for e in 0..mesh.num_edges() {
        let [a, b] = mesh.edge_vertices(e);
        let sharers_b = mesh.vertex_sharers(b);
        let (ga, gb) = mesh.edge_key(e);
        for &rank in mesh.vertex_sharers(a) {
            if sharers_b.contains(&rank) {
                offers
                    .entry(rank)
                    .or_default()
                    .push(WireEdgeKey::new(ga.get(), gb.get()));
            }
        }
    }

    let mut shared: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (rank, keys) in exchange_records(comm, offers)? {
        for key in keys {
            if let Some(e) = mesh.edge_index(GlobalId::new(key.a()), GlobalId::new(key.b())) {
                shared.entry(e).or_default().push(rank);
            }
        }
    }
    for ranks in shared.values_mut() {
        ranks.sort_unstable();
        ranks.dedup();
    }
    Ok(shared)
}
