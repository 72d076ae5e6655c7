//! Boolean refinement markers over mesh entities of one dimension.

use crate::mesh_error::MeshRefineError;
use crate::topology::mesh::SimplexMesh;

/// A boolean value per entity of dimension `dim`.
///
/// How a marker turns into marked edges:
/// - `dim == 0`: every edge incident to a marked vertex;
/// - `dim == 1`: the marked edges themselves;
/// - `dim >= 2`: every edge of a marked face or cell.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityMarker {
    dim: usize,
    values: Vec<bool>,
}

impl EntityMarker {
    pub fn new(dim: usize, values: Vec<bool>) -> Self {
        Self { dim, values }
    }

    /// Marker over cells (`dim == tdim`).
    pub fn cells(mesh: &SimplexMesh, values: Vec<bool>) -> Self {
        Self::new(mesh.tdim(), values)
    }

    pub fn edges(values: Vec<bool>) -> Self {
        Self::new(1, values)
    }

    pub fn vertices(values: Vec<bool>) -> Self {
        Self::new(0, values)
    }

    /// Evaluate `predicate` on every entity of dimension `dim`.
    pub fn from_fn<F>(mesh: &SimplexMesh, dim: usize, predicate: F) -> Result<Self, MeshRefineError>
    where
        F: FnMut(usize) -> bool,
    {
        let n = mesh
            .num_entities(dim)
            .ok_or(MeshRefineError::MarkerDimension {
                dim,
                tdim: mesh.tdim(),
            })?;
        Ok(Self::new(dim, (0..n).map(predicate).collect()))
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn is_marked(&self, entity: usize) -> bool {
        self.values.get(entity).copied().unwrap_or(false)
    }

    /// Check that the marker fits `mesh`.
    pub fn validate(&self, mesh: &SimplexMesh) -> Result<(), MeshRefineError> {
        let expected = mesh
            .num_entities(self.dim)
            .ok_or(MeshRefineError::MarkerDimension {
                dim: self.dim,
                tdim: mesh.tdim(),
            })?;
        if self.values.len() != expected {
            return Err(MeshRefineError::MarkerSizeMismatch {
                dim: self.dim,
                expected,
                found: self.values.len(),
            });
        }
        Ok(())
    }
}
