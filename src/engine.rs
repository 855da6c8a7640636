//! The greedy set-cover main loop: repeatedly pick the attribute that
//! discerns the most still-uncovered inter-class pairs, mark those pairs
//! covered, and stop once none remain.
//!
//! Each worker owns a contiguous window of the canonical pair ordering (see
//! [`crate::pairs`]) and keeps its own partial totals and covered set; the
//! [`Communicator`] is what turns those partial views into one agreed-upon
//! choice per round.

use crate::bits::{bit_check, Word, WORD_BITS};
use crate::comm::Communicator;
use crate::dataset::Dataset;
use crate::error::LaidError;
use crate::matrix::{ImplicitDisjointMatrix, PairSource};
use crate::pairs::PairEnumerator;

/// A worker's contiguous share of the canonical pair ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairWindow {
    pub start: u64,
    pub len: u64,
}

/// Splits `total` pairs into `size` windows as evenly as possible: the first
/// `total % size` workers get one extra pair each, matching the usual
/// block-distribution strategy for a workload that cannot be reshuffled
/// after the fact.
pub fn partition(total: u64, size: usize, rank: usize) -> PairWindow {
    let size = size as u64;
    let rank = rank as u64;
    let base = total / size;
    let extra = total % size;
    let (start, len) = if rank < extra {
        (rank * (base + 1), base + 1)
    } else {
        (extra * (base + 1) + (rank - extra) * base, base)
    };
    PairWindow { start, len }
}

/// A bit-packed "is this local pair index covered" set, the Rust analogue of
/// the original's `covered_lines` word array.
struct CoveredSet {
    words: Vec<Word>,
}

impl CoveredSet {
    fn new(len: u64) -> Self {
        let n_words = (len as usize).div_ceil(WORD_BITS as usize).max(1);
        CoveredSet {
            words: vec![0; n_words],
        }
    }

    #[inline]
    fn get(&self, idx: u64) -> bool {
        let (word, bit) = (idx / WORD_BITS as u64, (idx % WORD_BITS as u64) as u32);
        bit_check(self.words[word as usize], bit)
    }

    #[inline]
    fn set(&mut self, idx: u64) {
        let (word, bit) = (idx / WORD_BITS as u64, (idx % WORD_BITS as u64) as u32);
        self.words[word as usize] = crate::bits::bit_set(self.words[word as usize], bit);
    }
}

/// Adds one to `totals[attribute]` for every attribute `xor_row` discerns.
fn accumulate_add(xor_row: &[Word], n_attributes: usize, totals: &mut [u64]) {
    let mut attribute = 0usize;
    for &word in xor_row {
        let bits_here = (n_attributes - attribute).min(WORD_BITS as usize);
        for bit in 0..bits_here as u32 {
            if bit_check(word, bit) {
                totals[attribute] += 1;
            }
            attribute += 1;
        }
    }
}

/// Subtracts one from `totals[attribute]` for every attribute `xor_row`
/// discerns. The inverse of [`accumulate_add`], used by sub-mode updates.
fn accumulate_sub(xor_row: &[Word], n_attributes: usize, totals: &mut [u64]) {
    let mut attribute = 0usize;
    for &word in xor_row {
        let bits_here = (n_attributes - attribute).min(WORD_BITS as usize);
        for bit in 0..bits_here as u32 {
            if bit_check(word, bit) {
                totals[attribute] -= 1;
            }
            attribute += 1;
        }
    }
}

/// First-wins argmax over the globally reduced totals, `-1` once every
/// attribute's total is `0` (nothing left to cover).
fn best_attribute(global_totals: &[u64]) -> i64 {
    let mut max_total = 0u64;
    let mut best: i64 = -1;
    for (attribute, &total) in global_totals.iter().enumerate() {
        if total > max_total {
            max_total = total;
            best = attribute as i64;
        }
    }
    best
}

/// Runs this worker's share of the greedy cover loop to completion and
/// returns the globally selected attributes in ascending order. Every
/// worker in `comm`'s group must call this, since every loop iteration is a
/// collective.
pub fn run(dataset: &Dataset, comm: &dyn Communicator, window: PairWindow) -> Result<Vec<usize>, LaidError> {
    let n_attributes = dataset.n_attributes;
    let matrix = ImplicitDisjointMatrix::new(dataset);

    let mut covered = CoveredSet::new(window.len);
    let mut local_totals = vec![0u64; n_attributes];
    let mut local_remaining = window.len;

    let attr_words = dataset.attr_words();
    let mut xor_buf = vec![0 as Word; attr_words];

    for (local_idx, pair) in PairEnumerator::new(&dataset.class_index, window.start, window.len).enumerate() {
        matrix.row_xor_into(pair, &mut xor_buf);
        accumulate_add(&xor_buf, n_attributes, &mut local_totals);
        let _ = local_idx;
    }

    let mut selected = Vec::new();

    loop {
        let global_totals = comm.all_reduce_sum(&local_totals)?;

        let proposal = if comm.rank() == 0 {
            Some(best_attribute(&global_totals))
        } else {
            None
        };
        let chosen = comm.broadcast(proposal)?;

        if chosen < 0 {
            break;
        }
        let chosen = chosen as usize;
        selected.push(chosen);

        let delta = local_totals[chosen];
        if delta == 0 {
            continue;
        }
        local_remaining -= delta;

        if local_remaining < delta {
            // Add mode: the surviving uncovered set is now the smaller one,
            // so it is cheaper to recompute local_totals from scratch over
            // it than to subtract the larger newly-covered set's
            // contributions one by one.
            local_totals.iter_mut().for_each(|t| *t = 0);
            for (local_idx, pair) in
                PairEnumerator::new(&dataset.class_index, window.start, window.len).enumerate()
            {
                let local_idx = local_idx as u64;
                if covered.get(local_idx) {
                    continue;
                }
                if matrix.entry(pair, chosen) {
                    covered.set(local_idx);
                    continue;
                }
                matrix.row_xor_into(pair, &mut xor_buf);
                accumulate_add(&xor_buf, n_attributes, &mut local_totals);
            }
        } else {
            // Sub mode: the newly covered set is the smaller one; subtract
            // its contribution from the existing totals in place.
            for (local_idx, pair) in
                PairEnumerator::new(&dataset.class_index, window.start, window.len).enumerate()
            {
                let local_idx = local_idx as u64;
                if covered.get(local_idx) {
                    continue;
                }
                if matrix.entry(pair, chosen) {
                    covered.set(local_idx);
                    matrix.row_xor_into(pair, &mut xor_buf);
                    accumulate_sub(&xor_buf, n_attributes, &mut local_totals);
                }
            }
        }
    }

    selected.sort_unstable();
    Ok(selected)
}
