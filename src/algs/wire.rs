//! Fixed, little-endian wire types for refinement exchanges.
//!
//! All multi-byte integers in these structs are **little-endian** on the wire.
//! We store them pre-LE with `.to_le()` and decode with `.from_le()`.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Global identity of an edge: endpoint global ids, smaller first.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEdgeKey {
    pub a_le: u64,
    pub b_le: u64,
}

impl WireEdgeKey {
    pub fn new(a: u64, b: u64) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            a_le: a.to_le(),
            b_le: b.to_le(),
        }
    }
    pub fn a(&self) -> u64 {
        u64::from_le(self.a_le)
    }
    pub fn b(&self) -> u64 {
        u64::from_le(self.b_le)
    }
}

/// A bisected edge and the global id of its new midpoint vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEdgeVertex {
    pub key: WireEdgeKey,
    pub vertex_le: u64,
}

impl WireEdgeVertex {
    pub fn new(a: u64, b: u64, vertex: u64) -> Self {
        Self {
            key: WireEdgeKey::new(a, b),
            vertex_le: vertex.to_le(),
        }
    }
    pub fn vertex(&self) -> u64 {
        u64::from_le(self.vertex_le)
    }
}

/// A cell moving between ranks: its global id, its parent's global id and up
/// to four vertex global ids (`num_vertices` of them are meaningful).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCell {
    pub cell_le: u64,
    pub parent_le: u64,
    pub vertices_le: [u64; 4],
    pub num_vertices_le: u32,
    pub _pad: u32, // pad to 8-byte alignment (explicit)
}

impl WireCell {
    pub const SIZE: usize = 56; // 6*8 + 4 + 4
    pub fn new(cell: u64, parent: u64, vertices: &[u64]) -> Self {
        let mut vertices_le = [0u64; 4];
        for (dst, v) in vertices_le.iter_mut().zip(vertices) {
            *dst = v.to_le();
        }
        Self {
            cell_le: cell.to_le(),
            parent_le: parent.to_le(),
            vertices_le,
            num_vertices_le: (vertices.len().min(4) as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn cell(&self) -> u64 {
        u64::from_le(self.cell_le)
    }
    pub fn parent(&self) -> u64 {
        u64::from_le(self.parent_le)
    }
    pub fn vertices(&self) -> Vec<u64> {
        let n = u32::from_le(self.num_vertices_le) as usize;
        self.vertices_le[..n.min(4)]
            .iter()
            .map(|v| u64::from_le(*v))
            .collect()
    }
}

/// A vertex moving between ranks: global id plus up to three coordinates.
/// Coordinates travel as raw IEEE-754 bit patterns so they arrive bit-exact.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireVertex {
    pub id_le: u64,
    pub coords_le: [u64; 3],
}

impl WireVertex {
    pub fn new(id: u64, coords: &[f64]) -> Self {
        let mut coords_le = [0u64; 3];
        for (dst, x) in coords_le.iter_mut().zip(coords) {
            *dst = x.to_bits().to_le();
        }
        Self {
            id_le: id.to_le(),
            coords_le,
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn coords(&self, gdim: usize) -> Vec<f64> {
        self.coords_le[..gdim.min(3)]
            .iter()
            .map(|c| f64::from_bits(u64::from_le(*c)))
            .collect()
    }
}

/// A vertex global id and one rank holding a copy of it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireSharer {
    pub id_le: u64,
    pub rank_le: u64,
}

impl WireSharer {
    pub fn new(id: u64, rank: usize) -> Self {
        Self {
            id_le: id.to_le(),
            rank_le: (rank as u64).to_le(),
        }
    }
    pub fn id(&self) -> u64 {
        u64::from_le(self.id_le)
    }
    pub fn rank(&self) -> usize {
        u64::from_le(self.rank_le) as usize
    }
}

/// A single `u64` (ranks, counts, ids).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireU64(pub u64);

impl WireU64 {
    pub fn of(v: u64) -> Self {
        Self(v.to_le())
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.0)
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    // Pod/Zeroable ensures no padding contains uninit when cast to bytes.
    assert!(size_of::<WireEdgeKey>() == 16);
    assert!(size_of::<WireEdgeVertex>() == 24);
    assert!(size_of::<WireCell>() == WireCell::SIZE);
    assert!(align_of::<WireCell>() == 8);
    assert!(size_of::<WireVertex>() == 32);
    assert!(size_of::<WireSharer>() == 16);
    assert!(size_of::<WireU64>() == 8);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_canonical() {
        let k = WireEdgeKey::new(9, 4);
        assert_eq!((k.a(), k.b()), (4, 9));
    }

    #[test]
    fn cell_record_keeps_vertex_count() {
        let c = WireCell::new(11, 3, &[5, 6, 7]);
        let bytes: Vec<u8> = bytemuck::cast_slice(&[c]).to_vec();
        let back: Vec<WireCell> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(back[0].cell(), 11);
        assert_eq!(back[0].parent(), 3);
        assert_eq!(back[0].vertices(), vec![5, 6, 7]);
    }

    #[test]
    fn vertex_coordinates_are_bit_exact() {
        let x = 0.1 + 0.2;
        let v = WireVertex::new(2, &[x, -0.0]);
        let c = v.coords(2);
        assert_eq!(c[0].to_bits(), x.to_bits());
        assert_eq!(c[1].to_bits(), (-0.0f64).to_bits());
        assert_eq!(WIRE_VERSION, 1);
    }
}
