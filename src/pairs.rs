//! Enumerates the canonical ordering of inter-class observation pairs that
//! defines the rows of the (never materialized) disjoint matrix: for classes
//! `ca < cb`, every observation of `ca` paired with every observation of
//! `cb`, `ca` ascending outermost, `cb` ascending next, then the index within
//! each class ascending.

use crate::dataset::ClassEntry;

/// One position in the canonical pair ordering: the class and within-class
/// index of each side of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassOffsets {
    pub class_a: usize,
    pub index_a: usize,
    pub class_b: usize,
    pub index_b: usize,
}

/// Total number of inter-class pairs implied by `class_index`: every pair of
/// distinct classes contributes the product of their sizes.
pub fn total_pairs(class_index: &[ClassEntry]) -> u64 {
    let nc = class_index.len();
    let mut total: u64 = 0;
    for ca in 0..nc {
        for cb in (ca + 1)..nc {
            total += class_index[ca].count as u64 * class_index[cb].count as u64;
        }
    }
    total
}

/// Converts a pair position, given as a flat index `k` into the canonical
/// ordering, into the class/index pair it names. `k` must be in `[0,
/// total_pairs(class_index))`.
///
/// Two classes get an O(1) direct calculation (`k = index_a * count_b +
/// index_b`, since there is only one class pair to range over); more than
/// two classes fall back to an O(k) scan, since there is no closed form for
/// "which of the `nc*(nc-1)/2` class pairs does flat index `k` land in"
/// without the same scan this performs.
pub fn seek(class_index: &[ClassEntry], k: u64) -> ClassOffsets {
    let nc = class_index.len();
    debug_assert!(nc >= 2);

    if nc == 2 {
        let count_b = class_index[1].count as u64;
        return ClassOffsets {
            class_a: 0,
            index_a: (k / count_b) as usize,
            class_b: 1,
            index_b: (k % count_b) as usize,
        };
    }

    let mut seen: u64 = 0;
    for ca in 0..nc {
        let count_a = class_index[ca].count as u64;
        for index_a in 0..count_a {
            for cb in (ca + 1)..nc {
                let count_b = class_index[cb].count as u64;
                if k < seen + count_b {
                    let index_b = (k - seen) as usize;
                    return ClassOffsets {
                        class_a: ca,
                        index_a: index_a as usize,
                        class_b: cb,
                        index_b,
                    };
                }
                seen += count_b;
            }
        }
    }
    panic!("k={k} out of range for total_pairs={seen}");
}

/// A cursor over a contiguous window `[start, start + len)` of the canonical
/// pair ordering, advancing one pair at a time without recomputing `seek`
/// after the initial position.
pub struct PairEnumerator<'a> {
    class_index: &'a [ClassEntry],
    remaining: u64,
    current: ClassOffsets,
}

impl<'a> PairEnumerator<'a> {
    /// Builds an enumerator positioned at flat index `start`, covering `len`
    /// pairs.
    pub fn new(class_index: &'a [ClassEntry], start: u64, len: u64) -> Self {
        let current = if len == 0 {
            ClassOffsets {
                class_a: 0,
                index_a: 0,
                class_b: 0,
                index_b: 0,
            }
        } else {
            seek(class_index, start)
        };
        PairEnumerator {
            class_index,
            remaining: len,
            current,
        }
    }

    fn advance(&mut self) {
        let ClassOffsets {
            mut class_a,
            mut index_a,
            mut class_b,
            mut index_b,
        } = self.current;
        let nc = self.class_index.len();

        index_b += 1;
        if index_b >= self.class_index[class_b].count {
            index_b = 0;
            class_b += 1;
            if class_b >= nc {
                index_a += 1;
                class_b = class_a + 1;
                if index_a >= self.class_index[class_a].count {
                    index_a = 0;
                    class_a += 1;
                    class_b = class_a + 1;
                }
            }
        }

        self.current = ClassOffsets {
            class_a,
            index_a,
            class_b,
            index_b,
        };
    }
}

impl<'a> Iterator for PairEnumerator<'a> {
    type Item = ClassOffsets;

    fn next(&mut self) -> Option<ClassOffsets> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(out)
    }
}
