//! Splitting meshes across ranks and moving cells between them.
//!
//! - [`extract_shard`]: cut one rank's shard out of a mesh every rank holds
//!   (set-up helper for distributed runs and tests).
//! - [`assemble_local`]: build a rank-local mesh from cell records.
//! - [`redistribute_cells`]: ship cells (with lineage) to the ranks chosen by
//!   a [`CellPartitioner`].
//! - [`rebuild_shared_vertices`]: recompute shared-vertex metadata after
//!   cells moved, through a vertex registry distributed by `gid % size`.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::exchange_records;
use crate::algs::wire::{WireCell, WireSharer, WireU64, WireVertex};
use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;
use crate::topology::point::GlobalId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A cell in transit: its global id, its parent's global id and its vertices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellRecord {
    pub id: GlobalId,
    pub parent: GlobalId,
    pub vertices: Vec<GlobalId>,
}

/// Decides which rank each cell should live on after refinement.
pub trait CellPartitioner {
    /// Destination rank for every cell in `cells` (same order).
    ///
    /// Collective: every rank calls this with its own cells.
    fn assign(
        &self,
        cells: &[CellRecord],
        comm: &dyn Communicator,
    ) -> Result<Vec<usize>, MeshRefineError>;
}

/// Contiguous blocks of the global cell numbering, one block per rank.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockPartitioner;

impl CellPartitioner for BlockPartitioner {
    fn assign(
        &self,
        cells: &[CellRecord],
        comm: &dyn Communicator,
    ) -> Result<Vec<usize>, MeshRefineError> {
        let size = comm.size() as u64;
        let upper = comm.all_reduce_max(cells.iter().map(|c| c.id.get() + 1).max().unwrap_or(0))?;
        Ok(cells
            .iter()
            .map(|c| {
                if upper == 0 {
                    0
                } else {
                    ((c.id.get() as u128 * size as u128 / upper as u128) as usize)
                        .min(size as usize - 1)
                }
            })
            .collect())
    }
}

/// Extract the shard of `global` owned by `rank`, where `parts[c]` is the
/// rank of cell `c`. Vertex and cell global ids are preserved; shared-vertex
/// metadata lists every other rank whose shard uses the vertex.
pub fn extract_shard(
    global: &SimplexMesh,
    parts: &[usize],
    rank: usize,
) -> Result<SimplexMesh, MeshRefineError> {
    if parts.len() != global.num_cells() {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "cell partition",
            expected: global.num_cells(),
            found: parts.len(),
        });
    }

    let mut users: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); global.num_vertices()];
    for (c, &owner) in parts.iter().enumerate() {
        for &v in global.cell_vertices(c) {
            users[v].insert(owner);
        }
    }

    let mut local_of = vec![usize::MAX; global.num_vertices()];
    let mut vertex_ids = Vec::new();
    let mut coordinates = Vec::new();
    for v in 0..global.num_vertices() {
        if users[v].contains(&rank) {
            local_of[v] = vertex_ids.len();
            vertex_ids.push(global.vertex_global(v));
            coordinates.extend_from_slice(global.vertex_coordinates(v));
        }
    }

    let mut cells = Vec::new();
    let mut cell_ids = Vec::new();
    for (c, &owner) in parts.iter().enumerate() {
        if owner == rank {
            cells.extend(global.cell_vertices(c).iter().map(|&v| local_of[v]));
            cell_ids.push(global.cell_global(c));
        }
    }

    let mut shared = BTreeMap::new();
    for v in 0..global.num_vertices() {
        if local_of[v] != usize::MAX && users[v].len() > 1 {
            shared.insert(
                local_of[v],
                users[v].iter().copied().filter(|&r| r != rank).collect(),
            );
        }
    }

    SimplexMesh::new(global.tdim(), global.gdim(), vertex_ids, coordinates, &cells)?
        .with_cell_ids(cell_ids)?
        .with_shared_vertices(shared)
}

/// Build a rank-local mesh from `cells`, using `vertices` (in this order,
/// skipping vertices no cell references) for ids and coordinates.
/// Returns the mesh and the parent id of each of its cells.
pub fn assemble_local(
    tdim: usize,
    gdim: usize,
    vertices: &[(GlobalId, Vec<f64>)],
    cells: &[CellRecord],
) -> Result<(SimplexMesh, Vec<GlobalId>), MeshRefineError> {
    let used: BTreeSet<GlobalId> = cells.iter().flat_map(|c| c.vertices.iter().copied()).collect();
    let mut index_of = HashMap::with_capacity(used.len());
    let mut vertex_ids = Vec::with_capacity(used.len());
    let mut coordinates = Vec::with_capacity(used.len() * gdim);
    for (gid, coords) in vertices {
        if used.contains(gid) && !index_of.contains_key(gid) {
            index_of.insert(*gid, vertex_ids.len());
            vertex_ids.push(*gid);
            coordinates.extend_from_slice(coords);
        }
    }

    let mut connectivity = Vec::with_capacity(cells.len() * (tdim + 1));
    for (c, cell) in cells.iter().enumerate() {
        if cell.vertices.len() != tdim + 1 {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "cell record vertices",
                expected: tdim + 1,
                found: cell.vertices.len(),
            });
        }
        for gid in &cell.vertices {
            let v = index_of
                .get(gid)
                .copied()
                .ok_or(MeshRefineError::VertexOutOfRange {
                    cell: c,
                    vertex: gid.get() as usize,
                    num_vertices: vertex_ids.len(),
                })?;
            connectivity.push(v);
        }
    }

    let mesh = SimplexMesh::new(tdim, gdim, vertex_ids, coordinates, &connectivity)?
        .with_cell_ids(cells.iter().map(|c| c.id).collect())?;
    Ok((mesh, cells.iter().map(|c| c.parent).collect()))
}

/// Move every cell to the rank `partitioner` assigns it, together with the
/// coordinates of its vertices. Received cells are ordered by global id and
/// received vertices by global id, so the result does not depend on message
/// arrival order. Collective.
pub fn redistribute_cells<C>(
    comm: &C,
    partitioner: &dyn CellPartitioner,
    gdim: usize,
    vertices: &[(GlobalId, Vec<f64>)],
    cells: Vec<CellRecord>,
) -> Result<(Vec<(GlobalId, Vec<f64>)>, Vec<CellRecord>), MeshRefineError>
where
    C: Communicator,
{
    let dest = partitioner.assign(&cells, comm)?;
    if dest.len() != cells.len() {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "partitioner output",
            expected: cells.len(),
            found: dest.len(),
        });
    }

    let coords_of: HashMap<GlobalId, &[f64]> =
        vertices.iter().map(|(g, x)| (*g, x.as_slice())).collect();
    let mut cell_out: BTreeMap<usize, Vec<WireCell>> = BTreeMap::new();
    let mut vertex_sets: BTreeMap<usize, BTreeSet<GlobalId>> = BTreeMap::new();
    for (cell, &rank) in cells.iter().zip(&dest) {
        if rank >= comm.size() {
            return Err(MeshRefineError::IndexBufferMismatch {
                what: "destination rank",
                expected: comm.size(),
                found: rank,
            });
        }
        let raw: Vec<u64> = cell.vertices.iter().map(|g| g.get()).collect();
        cell_out
            .entry(rank)
            .or_default()
            .push(WireCell::new(cell.id.get(), cell.parent.get(), &raw));
        vertex_sets
            .entry(rank)
            .or_default()
            .extend(cell.vertices.iter().copied());
    }
    let mut vertex_out: BTreeMap<usize, Vec<WireVertex>> = BTreeMap::new();
    for (rank, set) in vertex_sets {
        let records = set
            .into_iter()
            .map(|g| {
                coords_of
                    .get(&g)
                    .map(|x| WireVertex::new(g.get(), x))
                    .ok_or_else(|| MeshRefineError::InvariantViolation(format!(
                        "vertex {g} of an outgoing cell has no coordinates"
                    )))
            })
            .collect::<Result<Vec<_>, _>>()?;
        vertex_out.insert(rank, records);
    }

    let cells_in = exchange_records(comm, cell_out)?;
    let vertices_in = exchange_records(comm, vertex_out)?;

    let mut received: Vec<CellRecord> = cells_in
        .into_values()
        .flatten()
        .map(|w| CellRecord {
            id: GlobalId::new(w.cell()),
            parent: GlobalId::new(w.parent()),
            vertices: w.vertices().into_iter().map(GlobalId::new).collect(),
        })
        .collect();
    received.sort_by_key(|c| c.id);

    let mut coords: BTreeMap<GlobalId, Vec<f64>> = BTreeMap::new();
    for w in vertices_in.into_values().flatten() {
        coords.entry(GlobalId::new(w.id())).or_insert_with(|| w.coords(gdim));
    }
    Ok((coords.into_iter().collect(), received))
}

/// Recompute which other ranks hold each vertex of `mesh`. Collective.
pub fn rebuild_shared_vertices<C>(
    comm: &C,
    mesh: &SimplexMesh,
) -> Result<BTreeMap<usize, Vec<usize>>, MeshRefineError>
where
    C: Communicator,
{
    if comm.is_serial() {
        return Ok(BTreeMap::new());
    }
    let size = comm.size() as u64;

    // 1) register every local vertex with its registry rank
    let mut register: BTreeMap<usize, Vec<WireU64>> = BTreeMap::new();
    for gid in mesh.vertex_global_ids() {
        register
            .entry((gid.get() % size) as usize)
            .or_default()
            .push(WireU64::of(gid.get()));
    }
    let registered = exchange_records(comm, register)?;

    // 2) registry: gid -> ranks holding it
    let mut holders: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (rank, ids) in &registered {
        for id in ids {
            holders.entry(id.get()).or_default().push(*rank);
        }
    }

    // 3) tell every holder about every other holder
    let mut replies: BTreeMap<usize, Vec<WireSharer>> = BTreeMap::new();
    for (id, ranks) in &holders {
        if ranks.len() < 2 {
            continue;
        }
        for &dst in ranks {
            for &other in ranks {
                if other != dst {
                    replies
                        .entry(dst)
                        .or_default()
                        .push(WireSharer::new(*id, other));
                }
            }
        }
    }
    let answers = exchange_records(comm, replies)?;

    let mut shared: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for record in answers.into_values().flatten() {
        let v = mesh
            .vertex_index(GlobalId::new(record.id()))
            .ok_or_else(|| MeshRefineError::InvariantViolation(format!(
                "registry returned unknown vertex {}",
                record.id()
            )))?;
        shared.entry(v).or_default().push(record.rank());
    }
    for ranks in shared.values_mut() {
        ranks.sort_unstable();
        ranks.dedup();
    }
    Ok(shared)
}
