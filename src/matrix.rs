//! The disjoint matrix is never materialized. Any row (XOR of an inter-class
//! observation pair) or column (which attributes discern a given pair range)
//! is computed on demand straight from the dataset, through this module.

use crate::bits::{bit_check, locate, Word};
use crate::dataset::Dataset;
use crate::pairs::{ClassOffsets, PairEnumerator};

/// Gives access to disjoint-matrix rows and columns without ever storing the
/// matrix itself. A worker only ever needs its own contiguous window of
/// pairs, so every method takes the pair explicitly rather than tracking
/// cursor state.
pub trait PairSource {
    /// XORs the attribute words of the two observations named by `pair` into
    /// `out` (which must be `attr_words()` long), leaving `out` holding the
    /// disjoint-matrix row for that pair.
    fn row_xor_into(&self, pair: ClassOffsets, out: &mut [Word]);

    /// Whether `attribute` discerns the observations named by `pair` (i.e.
    /// the disjoint-matrix entry at that row/column is `1`).
    fn entry(&self, pair: ClassOffsets, attribute: usize) -> bool;
}

/// The default [`PairSource`]: reads rows directly out of an in-memory,
/// class-indexed [`Dataset`].
pub struct ImplicitDisjointMatrix<'a> {
    dataset: &'a Dataset,
}

impl<'a> ImplicitDisjointMatrix<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        ImplicitDisjointMatrix { dataset }
    }

    fn observation(&self, class: usize, index: usize) -> &[Word] {
        let entry = self.dataset.class_index[class];
        self.dataset.row(entry.first + index)
    }

    /// Every attribute that discerns `pair`, as a column vector of the same
    /// length as [`PairEnumerator`] covers, expressed as the XOR row itself
    /// (callers needing the bit at a specific attribute should use
    /// [`PairSource::entry`]).
    pub fn column(&self, attribute: usize, pairs: PairEnumerator<'_>) -> Vec<bool> {
        let (word_idx, bit) = locate(attribute);
        pairs
            .map(|pair| {
                let a = self.observation(pair.class_a, pair.index_a);
                let b = self.observation(pair.class_b, pair.index_b);
                bit_check(a[word_idx] ^ b[word_idx], bit)
            })
            .collect()
    }
}

impl<'a> PairSource for ImplicitDisjointMatrix<'a> {
    fn row_xor_into(&self, pair: ClassOffsets, out: &mut [Word]) {
        let a = self.observation(pair.class_a, pair.index_a);
        let b = self.observation(pair.class_b, pair.index_b);
        let attr_words = self.dataset.attr_words();
        for (o, (&wa, &wb)) in out.iter_mut().zip(a[..attr_words].iter().zip(b[..attr_words].iter())) {
            *o = wa ^ wb;
        }
    }

    fn entry(&self, pair: ClassOffsets, attribute: usize) -> bool {
        let (word_idx, bit) = locate(attribute);
        let a = self.observation(pair.class_a, pair.index_a);
        let b = self.observation(pair.class_b, pair.index_b);
        bit_check(a[word_idx] ^ b[word_idx], bit)
    }
}
