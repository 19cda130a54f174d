//! Communication port for collective topology construction.
//!
//! The mesh core talks to the outside world through a single narrow trait,
//! [`Communicator`]: rank, size, a variable-sized all-to-all byte exchange,
//! and a barrier. Construction is collective; every rank of a communicator
//! must call the same constructor with matching global metadata.
//!
//! Wire format conventions (for the payloads higher layers exchange):
//! - All integers are fixed width (u32 counts/tags/ranks, u64 ids, f64
//!   coordinates), little-endian on the wire; peers are assumed homogeneous.
//! - Records are `#[repr(C)]` and `bytemuck::Pod`-safe; no `#[repr(packed)]`.
//! - Payload lengths must be exact multiples of the record size; receivers
//!   reject ragged buffers.
//!
//! Three implementations ship with the crate:
//! - [`NoComm`] — single-rank loopback for serial construction and tests.
//! - [`LocalComm`] — an in-process "universe" of ranks backed by a shared
//!   mailbox, for deterministic threaded multi-rank tests.
//! - `MpiComm` — a thin adapter over `rsmpi`, behind the `mpi-support`
//!   feature.

use std::sync::{Arc, Condvar, Mutex};

use bytemuck::Pod;

use crate::error::TopologyError;

/// Collective communication interface (minimal by design).
///
/// `all_to_all_v` is the only data-motion primitive the mesh core needs:
/// every rank contributes one byte buffer per destination rank and receives
/// one byte buffer per source rank. Empty buffers are valid and must still
/// be "delivered" so the collective stays aligned across ranks.
pub trait Communicator: Send + Sync {
    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Variable-sized all-to-all exchange.
    ///
    /// `send[r]` is the payload for rank `r` (`send.len()` must equal
    /// `size()`); the returned vector holds the payload received from each
    /// rank. Blocks until the exchange completes on this rank.
    fn all_to_all_v(&self, send: Vec<Vec<u8>>) -> Vec<Vec<u8>>;

    /// Synchronization barrier.
    fn barrier(&self);
}

/// Cast a slice of wire records to its byte representation.
#[inline]
pub fn to_bytes<T: Pod>(records: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(records).to_vec()
}

/// Reinterpret a received byte payload as wire records.
///
/// Fails with [`TopologyError::MeshInvariant`] when the payload length is
/// not a whole number of records; a ragged buffer means the peers disagreed
/// about the protocol, which only happens on inconsistent collective input.
pub fn from_bytes<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, TopologyError> {
    let width = std::mem::size_of::<T>();
    if width == 0 || bytes.len() % width != 0 {
        return Err(TopologyError::MeshInvariant(format!(
            "ragged wire payload: {} bytes is not a multiple of the {}-byte record",
            bytes.len(),
            width
        )));
    }
    let mut out = vec![T::zeroed(); bytes.len() / width];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(bytes);
    Ok(out)
}

/// Single-rank loopback communicator for pure serial construction.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all_v(&self, send: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        assert_eq!(send.len(), 1, "NoComm expects exactly one send buffer");
        send
    }

    fn barrier(&self) {}
}

// --- LocalComm: in-process multi-rank universe ---

struct EpochBarrier {
    arrived: usize,
    epoch: usize,
}

struct Mailbox {
    size: usize,
    // slots[dst][src]: at most one in-flight payload per ordered pair.
    slots: Mutex<Vec<Vec<Option<Vec<u8>>>>>,
    delivered: Condvar,
    barrier: Mutex<EpochBarrier>,
    released: Condvar,
}

/// In-process communicator: `universe(n)` returns one handle per rank, all
/// sharing a mailbox. Intended for threaded multi-rank tests; each handle is
/// driven from its own thread.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    shared: Arc<Mailbox>,
}

impl LocalComm {
    /// Create a universe of `size` ranks sharing one mailbox.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        assert!(size > 0, "universe needs at least one rank");
        let shared = Arc::new(Mailbox {
            size,
            slots: Mutex::new(vec![vec![None; size]; size]),
            delivered: Condvar::new(),
            barrier: Mutex::new(EpochBarrier {
                arrived: 0,
                epoch: 0,
            }),
            released: Condvar::new(),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_to_all_v(&self, send: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        let n = self.shared.size;
        assert_eq!(send.len(), n, "one send buffer per rank required");
        // Deposit: a slot holds at most one payload, so a rank that races
        // ahead into the next collective blocks until the receiver drained
        // the previous one.
        for (dst, payload) in send.into_iter().enumerate() {
            let mut slots = self.shared.slots.lock().expect("mailbox poisoned");
            while slots[dst][self.rank].is_some() {
                slots = self
                    .shared
                    .delivered
                    .wait(slots)
                    .expect("mailbox poisoned");
            }
            slots[dst][self.rank] = Some(payload);
            self.shared.delivered.notify_all();
        }
        // Drain this rank's row.
        let mut out = Vec::with_capacity(n);
        for src in 0..n {
            let mut slots = self.shared.slots.lock().expect("mailbox poisoned");
            loop {
                if let Some(payload) = slots[self.rank][src].take() {
                    self.shared.delivered.notify_all();
                    out.push(payload);
                    break;
                }
                slots = self
                    .shared
                    .delivered
                    .wait(slots)
                    .expect("mailbox poisoned");
            }
        }
        out
    }

    fn barrier(&self) {
        let mut b = self.shared.barrier.lock().expect("barrier poisoned");
        let epoch = b.epoch;
        b.arrived += 1;
        if b.arrived == self.shared.size {
            b.arrived = 0;
            b.epoch += 1;
            self.shared.released.notify_all();
        } else {
            while b.epoch == epoch {
                b = self.shared.released.wait(b).expect("barrier poisoned");
            }
        }
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Communicator;
    use mpi::collective::CommunicatorCollectives;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::environment::Universe;
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    /// MPI-backed communicator; owns the MPI universe for the process.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_to_all_v(&self, send: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
            assert_eq!(send.len(), self.size, "one send buffer per rank required");
            let send_counts: Vec<i32> = send.iter().map(|b| b.len() as i32).collect();
            let mut recv_counts = vec![0i32; self.size];
            self.world.all_to_all_into(&send_counts, &mut recv_counts);

            let send_displs: Vec<i32> = prefix_sum(&send_counts);
            let recv_displs: Vec<i32> = prefix_sum(&recv_counts);
            let send_flat: Vec<u8> = send.concat();
            let total_recv: usize = recv_counts.iter().map(|&c| c as usize).sum();
            let mut recv_flat = vec![0u8; total_recv];

            let sendbuf = Partition::new(&send_flat[..], send_counts, &send_displs[..]);
            let mut recvbuf =
                PartitionMut::new(&mut recv_flat[..], recv_counts.clone(), &recv_displs[..]);
            self.world.all_to_all_varcount_into(&sendbuf, &mut recvbuf);

            let mut out = Vec::with_capacity(self.size);
            for r in 0..self.size {
                let start = recv_displs[r] as usize;
                let end = start + recv_counts[r] as usize;
                out.push(recv_flat[start..end].to_vec());
            }
            out
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }

    fn prefix_sum(counts: &[i32]) -> Vec<i32> {
        let mut displs = Vec::with_capacity(counts.len());
        let mut acc = 0i32;
        for &c in counts {
            displs.push(acc);
            acc += c;
        }
        displs
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
