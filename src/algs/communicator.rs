//! Thin façade over collective message passing between cooperating ranks.
//!
//! Refinement only ever communicates through *collectives*: every rank must
//! call every collective, in the same order, or the whole computation stalls.
//! The only required primitive is a personalized all-to-all of byte buffers;
//! reductions and gathers have default implementations on top of it.
//!
//! Backends:
//! - [`NoComm`]: single rank, every collective is local.
//! - [`ThreadComm`]: a simulated multi-rank world inside one process, one
//!   thread per rank, used by the multi-rank tests.
//! - `MpiComm` (feature `mpi-support`): native MPI collectives.

use crate::mesh_error::MeshRefineError;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Collective communication interface.
pub trait Communicator {
    /// This rank, in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;

    /// Personalized all-to-all: `outgoing[r]` is delivered to rank `r`; the
    /// result holds at index `r` the buffer rank `r` addressed to us.
    fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshRefineError>;

    fn is_serial(&self) -> bool {
        self.size() <= 1
    }

    /// Synchronize all ranks.
    fn barrier(&self) -> Result<(), MeshRefineError> {
        self.all_to_all(vec![Vec::new(); self.size()]).map(|_| ())
    }

    /// Gather one value from every rank, indexed by rank.
    fn all_gather(&self, value: u64) -> Result<Vec<u64>, MeshRefineError> {
        let bytes = value.to_le_bytes().to_vec();
        let incoming = self.all_to_all(vec![bytes; self.size()])?;
        incoming
            .into_iter()
            .enumerate()
            .map(|(peer, buf)| {
                let raw: [u8; 8] =
                    buf.as_slice()
                        .try_into()
                        .map_err(|_| MeshRefineError::MalformedMessage {
                            neighbor: peer,
                            record: 8,
                            found: buf.len(),
                        })?;
                Ok(u64::from_le_bytes(raw))
            })
            .collect()
    }

    /// Sum of `value` over all ranks.
    fn all_reduce_sum(&self, value: u64) -> Result<u64, MeshRefineError> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    /// Maximum of `value` over all ranks.
    fn all_reduce_max(&self, value: u64) -> Result<u64, MeshRefineError> {
        Ok(self.all_gather(value)?.into_iter().max().unwrap_or(value))
    }
}

fn check_outgoing(outgoing: &[Vec<u8>], size: usize) -> Result<(), MeshRefineError> {
    if outgoing.len() != size {
        return Err(MeshRefineError::IndexBufferMismatch {
            what: "all_to_all outgoing buffers",
            expected: size,
            found: outgoing.len(),
        });
    }
    Ok(())
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshRefineError> {
        check_outgoing(&outgoing, 1)?;
        Ok(outgoing)
    }
}

// --- ThreadComm: simulated ranks, one thread each ---
type Key = (usize, usize, u64); // (src, dst, collective sequence number)

/// Anything that can be waited on.
pub trait Wait {
    /// Block until the message arrives; `None` if it never did.
    fn wait(self) -> Option<Vec<u8>>;
}

/// Pending receive from the shared mailbox.
pub struct LocalHandle {
    mailbox: Arc<DashMap<Key, Bytes>>,
    key: Key,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let start = Instant::now();
        loop {
            if let Some((_, bytes)) = self.mailbox.remove(&self.key) {
                return Some(bytes.to_vec());
            }
            if start.elapsed() > self.timeout {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

/// One rank of an in-process world. Create a whole world with
/// [`ThreadComm::world`] and move each handle onto its own thread.
///
/// A peer that never reaches a collective is reported as
/// [`MeshRefineError::Comm`] after the world's timeout instead of hanging
/// the test process.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<DashMap<Key, Bytes>>,
    seq: AtomicU64,
    timeout: Duration,
}

impl ThreadComm {
    /// Default time a rank waits for a peer inside one collective.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create `size` connected ranks.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        Self::world_with_timeout(size, Self::DEFAULT_TIMEOUT)
    }

    pub fn world_with_timeout(size: usize, timeout: Duration) -> Vec<ThreadComm> {
        let mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                seq: AtomicU64::new(0),
                timeout,
            })
            .collect()
    }

    fn isend(&self, peer: usize, seq: u64, buf: Vec<u8>) {
        self.mailbox.insert((self.rank, peer, seq), Bytes::from(buf));
    }

    fn irecv(&self, peer: usize, seq: u64) -> LocalHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, seq),
            timeout: self.timeout,
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshRefineError> {
        check_outgoing(&outgoing, self.size)?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut incoming = vec![Vec::new(); self.size];
        for (peer, buf) in outgoing.into_iter().enumerate() {
            if peer == self.rank {
                incoming[peer] = buf;
            } else {
                self.isend(peer, seq, buf);
            }
        }
        for (peer, slot) in incoming.iter_mut().enumerate() {
            if peer == self.rank {
                continue;
            }
            *slot = self
                .irecv(peer, seq)
                .wait()
                .ok_or_else(|| MeshRefineError::Comm {
                    neighbor: peer,
                    message: format!("no message for collective #{seq} from rank {peer}"),
                })?;
        }
        Ok(incoming)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{check_outgoing, Communicator};
    use crate::mesh_error::MeshRefineError;
    use mpi::collective::SystemOperation;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::environment::Universe;
    use mpi::topology::{Communicator as MpiCommunicator, SimpleCommunicator};
    use mpi::traits::CommunicatorCollectives;
    use mpi::Count;

    /// World communicator of an MPI job. Finalizes MPI when dropped.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, MeshRefineError> {
            let universe = mpi::initialize().ok_or_else(|| MeshRefineError::Comm {
                neighbor: 0,
                message: "MPI is already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    fn displacements(counts: &[Count]) -> Vec<Count> {
        counts
            .iter()
            .scan(0, |acc, &n| {
                let d = *acc;
                *acc += n;
                Some(d)
            })
            .collect()
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_to_all(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshRefineError> {
            check_outgoing(&outgoing, self.size)?;
            let send_counts: Vec<Count> = outgoing.iter().map(|b| b.len() as Count).collect();
            let mut recv_counts = vec![0 as Count; self.size];
            self.world
                .all_to_all_into(&send_counts[..], &mut recv_counts[..]);

            let send_displs = displacements(&send_counts);
            let recv_displs = displacements(&recv_counts);
            let send_buf: Vec<u8> = outgoing.concat();
            let total: usize = recv_counts.iter().map(|&n| n as usize).sum();
            let mut recv_buf = vec![0u8; total];
            {
                let send = Partition::new(&send_buf[..], &send_counts[..], &send_displs[..]);
                let mut recv =
                    PartitionMut::new(&mut recv_buf[..], &recv_counts[..], &recv_displs[..]);
                self.world.all_to_all_varcount_into(&send, &mut recv);
            }

            Ok(recv_counts
                .iter()
                .zip(&recv_displs)
                .map(|(&n, &d)| recv_buf[d as usize..(d + n) as usize].to_vec())
                .collect())
        }

        fn all_gather(&self, value: u64) -> Result<Vec<u64>, MeshRefineError> {
            let mut out = vec![0u64; self.size];
            self.world.all_gather_into(&value, &mut out[..]);
            Ok(out)
        }

        fn all_reduce_sum(&self, value: u64) -> Result<u64, MeshRefineError> {
            let mut out = 0u64;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::sum());
            Ok(out)
        }

        fn all_reduce_max(&self, value: u64) -> Result<u64, MeshRefineError> {
            let mut out = 0u64;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::max());
            Ok(out)
        }

        fn barrier(&self) -> Result<(), MeshRefineError> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
