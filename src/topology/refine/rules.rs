//! Conformity closure: a face with any marked edge must have its longest
//! edge marked.
//!
//! Marks only ever go from unmarked to marked, so the rounds terminate once
//! no rank marks anything new.

use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;
use crate::topology::refine::parallel::ParallelRefinement;

/// Outcome of [`enforce_rules`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClosureReport {
    /// Rounds run, including the final round that changed nothing.
    pub rounds: usize,
    /// Longest edges marked on this rank by the rule (not by synchronization).
    pub local_marks: usize,
}

/// Extend the marked set until every face satisfies the longest-edge rule on
/// every rank. `long_edge[f]` is the longest edge of face `f`. Collective.
pub fn enforce_rules<C: Communicator>(
    refinement: &mut ParallelRefinement<'_, C>,
    long_edge: &[usize],
) -> Result<ClosureReport, MeshRefineError> {
    let mesh = refinement.mesh();
    let comm = refinement.comm();
    check_table(mesh, long_edge)?;

    let mut report = ClosureReport::default();
    loop {
        report.rounds += 1;
        let synced = refinement.sync_marks()?;

        let mut local = 0usize;
        for (face, &long_e) in long_edge.iter().enumerate() {
            if refinement.is_marked(long_e) {
                continue;
            }
            if mesh.face_edges(face).iter().any(|&e| refinement.is_marked(e)) {
                refinement.mark(long_e)?;
                local += 1;
            }
        }
        report.local_marks += local;

        let global = comm.all_reduce_sum(local as u64)?;
        log::debug!(
            "closure round {}: {synced} marks synchronized, {local} local, {global} global",
            report.rounds
        );
        if global == 0 {
            return Ok(report);
        }
    }
}

fn check_table(mesh: &SimplexMesh, long_edge: &[usize]) -> Result<(), MeshRefineError> {
    if long_edge.len() != mesh.num_faces() {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "face longest edges",
            expected: mesh.num_faces(),
            found: long_edge.len(),
        });
    }
    Ok(())
}

/// Verify on this rank that every face with a marked edge has its longest
/// edge marked.
pub fn check_closure(
    mesh: &SimplexMesh,
    marked: &[bool],
    long_edge: &[usize],
) -> Result<(), MeshRefineError> {
    check_table(mesh, long_edge)?;
    let is_marked = |e: usize| marked.get(e).copied().unwrap_or(false);
    for (face, &long_e) in long_edge.iter().enumerate() {
        if !is_marked(long_e) && mesh.face_edges(face).iter().any(|&e| is_marked(e)) {
            return Err(MeshRefineError::InvariantViolation(format!(
                "face {face} has a marked edge but its longest edge {long_e} is unmarked"
            )));
        }
    }
    Ok(())
}
