//! The `Communicator` abstraction that stands in for MPI's collectives.
//!
//! The cover engine only ever needs two group operations: sum a per-attribute
//! vector across every worker, and have one worker's value win and be seen by
//! everyone else. [`SingleProcessCommunicator`] is the identity for both
//! (used by tests and by `--threads 1`); [`ThreadCommunicator`] implements
//! them for a fixed group of OS threads with a `Mutex`+`Condvar` barrier, the
//! same primitives a parallel solver would park and wake worker threads
//! with.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::TransportError;

/// A group communication primitive. Every method is a collective: every
/// member of the group must call it the same number of times, in the same
/// order, or the group deadlocks (mirroring MPI's own contract).
pub trait Communicator: Send + Sync {
    /// This member's position in the group, `0..size()`.
    fn rank(&self) -> usize;

    /// The number of members in the group.
    fn size(&self) -> usize;

    /// Element-wise sums `local` across every member and returns the result
    /// to all of them.
    fn all_reduce_sum(&self, local: &[u64]) -> Result<Vec<u64>, TransportError>;

    /// Rank 0 supplies `Some(value)`; every other rank passes `None`. Every
    /// member (including rank 0) gets back the value rank 0 supplied.
    fn broadcast(&self, value_at_root: Option<i64>) -> Result<i64, TransportError>;
}

/// The identity group of size 1: used for single-threaded runs and for tests
/// that want the cover engine's logic without any concurrency.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleProcessCommunicator;

impl Communicator for SingleProcessCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, local: &[u64]) -> Result<Vec<u64>, TransportError> {
        Ok(local.to_vec())
    }

    fn broadcast(&self, value_at_root: Option<i64>) -> Result<i64, TransportError> {
        value_at_root.ok_or(TransportError::LengthMismatch {
            expected: 1,
            got: 0,
        })
    }
}

/// Shared, mutex-guarded state for one group of [`ThreadCommunicator`]s. Two
/// independent generation counters let `all_reduce_sum` and `broadcast` be
/// called in any interleaving without one phase's stragglers waking up on
/// the other phase's notification.
struct Critical {
    reduce_arrived: usize,
    reduce_generation: u64,
    partials: Vec<Option<Vec<u64>>>,
    reduced: Option<Vec<u64>>,

    bcast_arrived: usize,
    bcast_generation: u64,
    bcast_value: Option<i64>,
}

struct Shared {
    size: usize,
    critical: Mutex<Critical>,
    monitor: Condvar,
}

/// One member of a fixed-size group of OS threads, all holding a handle to
/// the same [`Shared`] state. Construct a whole group with
/// [`ThreadCommunicator::group`] and hand one handle to each
/// `std::thread::scope`-spawned worker.
pub struct ThreadCommunicator {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadCommunicator {
    /// Builds `size` communicator handles sharing one barrier/reduction
    /// state, one per logical worker.
    pub fn group(size: usize) -> Vec<ThreadCommunicator> {
        assert!(size >= 1, "a communicator group needs at least one member");
        let shared = Arc::new(Shared {
            size,
            critical: Mutex::new(Critical {
                reduce_arrived: 0,
                reduce_generation: 0,
                partials: vec![None; size],
                reduced: None,
                bcast_arrived: 0,
                bcast_generation: 0,
                bcast_value: None,
            }),
            monitor: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadCommunicator {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_reduce_sum(&self, local: &[u64]) -> Result<Vec<u64>, TransportError> {
        if self.shared.size == 1 {
            return Ok(local.to_vec());
        }

        let mut critical = self.shared.critical.lock();
        critical.partials[self.rank] = Some(local.to_vec());
        critical.reduce_arrived += 1;
        let my_generation = critical.reduce_generation;

        if critical.reduce_arrived == self.shared.size {
            let len = local.len();
            let mut sum = vec![0u64; len];
            for slot in critical.partials.iter() {
                let v = slot.as_ref().ok_or(TransportError::WorkerLost)?;
                if v.len() != len {
                    return Err(TransportError::LengthMismatch {
                        expected: len,
                        got: v.len(),
                    });
                }
                for (acc, &x) in sum.iter_mut().zip(v.iter()) {
                    *acc += x;
                }
            }
            critical.reduced = Some(sum.clone());
            critical.reduce_arrived = 0;
            critical.reduce_generation += 1;
            for slot in critical.partials.iter_mut() {
                *slot = None;
            }
            self.shared.monitor.notify_all();
            Ok(sum)
        } else {
            while critical.reduce_generation == my_generation {
                self.shared.monitor.wait(&mut critical);
            }
            critical.reduced.clone().ok_or(TransportError::WorkerLost)
        }
    }

    fn broadcast(&self, value_at_root: Option<i64>) -> Result<i64, TransportError> {
        if self.shared.size == 1 {
            return value_at_root.ok_or(TransportError::WorkerLost);
        }

        let mut critical = self.shared.critical.lock();
        if self.rank == 0 {
            critical.bcast_value = value_at_root;
        }
        critical.bcast_arrived += 1;
        let my_generation = critical.bcast_generation;

        if critical.bcast_arrived == self.shared.size {
            critical.bcast_arrived = 0;
            critical.bcast_generation += 1;
            self.shared.monitor.notify_all();
            critical.bcast_value.ok_or(TransportError::WorkerLost)
        } else {
            while critical.bcast_generation == my_generation {
                self.shared.monitor.wait(&mut critical);
            }
            critical.bcast_value.ok_or(TransportError::WorkerLost)
        }
    }
}
