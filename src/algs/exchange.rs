//! Typed record exchange between ranks.
//!
//! Packs `Pod` records per destination rank into one collective
//! [`Communicator::all_to_all`] and decodes what every peer sent back.
//! Every rank must call [`exchange_records`] together, even with nothing to send.

use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshRefineError;
use bytemuck::Pod;
use std::collections::BTreeMap;

/// Send `outgoing[peer]` to each peer and return the records received,
/// keyed by source rank. Peers that sent nothing are omitted.
///
/// # Errors
/// - [`MeshRefineError::IndexBufferMismatch`] if a destination rank is out of range.
/// - [`MeshRefineError::MalformedMessage`] if a received buffer is not a whole
///   number of records.
/// - Any error of the underlying collective.
pub fn exchange_records<T, C>(
    comm: &C,
    outgoing: BTreeMap<usize, Vec<T>>,
) -> Result<BTreeMap<usize, Vec<T>>, MeshRefineError>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let mut buffers = vec![Vec::new(); size];
    for (peer, records) in outgoing {
        let slot = buffers
            .get_mut(peer)
            .ok_or(MeshRefineError::IndexBufferMismatch {
                what: "destination rank",
                expected: size,
                found: peer,
            })?;
        slot.extend_from_slice(bytemuck::cast_slice(&records));
    }

    let record = std::mem::size_of::<T>();
    let mut incoming = BTreeMap::new();
    for (peer, buf) in comm.all_to_all(buffers)?.into_iter().enumerate() {
        if buf.is_empty() {
            continue;
        }
        if buf.len() % record != 0 {
            return Err(MeshRefineError::MalformedMessage {
                neighbor: peer,
                record,
                found: buf.len(),
            });
        }
        incoming.insert(peer, bytemuck::pod_collect_to_vec::<u8, T>(&buf));
    }
    Ok(incoming)
}
