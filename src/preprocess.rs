//! Sorting, deduplication, JNSQ assignment and class indexing: the pipeline
//! that turns a freshly ingested [`Dataset`] into one whose rows are
//! class-contiguous, duplicate-free and fully discernible (no two rows with
//! distinct classes share the same attribute bits).
//!
//! Run in this order: [`sort_rows`], [`dedupe_rows`], [`add_jnsq_bits`],
//! [`index_classes`]. [`preprocess`] runs all four and reports what changed.

use std::str::FromStr;

use crate::bits::{invert_n_bits, write_field, Word};
use crate::dataset::{bits_needed, ClassEntry, Dataset};
use crate::error::{LaidError, ValidationError};

/// How the JNSQ inconsistency counter is written into its bit field.
/// `Invert` flips the counter's bits before writing whenever the field spans
/// more than one bit; `Identity` writes the counter unmodified. Both encode
/// the same discernibility information, so the choice is cosmetic (useful
/// when comparing dumps by eye).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JnsqEncoding {
    Invert,
    Identity,
}

impl Default for JnsqEncoding {
    fn default() -> Self {
        JnsqEncoding::Invert
    }
}

impl FromStr for JnsqEncoding {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invert" => Ok(JnsqEncoding::Invert),
            "identity" => Ok(JnsqEncoding::Identity),
            other => Err(format!("unknown jnsq encoding '{other}' (want invert|identity)")),
        }
    }
}

impl std::fmt::Display for JnsqEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JnsqEncoding::Invert => "invert",
            JnsqEncoding::Identity => "identity",
        })
    }
}

/// What preprocessing did to a dataset, for the CLI to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreprocessReport {
    pub duplicates_removed: usize,
    pub max_jnsq: u64,
    pub jnsq_bits: u32,
}

/// Runs the full pipeline in the required order and returns a summary.
pub fn preprocess(ds: &mut Dataset, encoding: JnsqEncoding) -> Result<PreprocessReport, LaidError> {
    sort_rows(ds);
    let duplicates_removed = dedupe_rows(ds);
    let max_jnsq = add_jnsq_bits(ds, encoding)?;
    index_classes(ds)?;
    Ok(PreprocessReport {
        duplicates_removed,
        max_jnsq,
        jnsq_bits: ds.n_bits_for_jnsqs,
    })
}

/// Sorts rows in place, ascending, by the lexicographic order of their full
/// `n_words`-word representation (attribute words then the class word). This
/// is what makes rows with identical attributes consecutive and, within a
/// run of identical attributes, orders them by class.
pub fn sort_rows(ds: &mut Dataset) {
    let nw = ds.n_words;
    let n = ds.n_observations;
    if n < 2 {
        return;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by(|&a, &b| {
        let ra = &ds.words[a * nw..a * nw + nw];
        let rb = &ds.words[b * nw..b * nw + nw];
        ra.cmp(rb)
    });

    let mut sorted = vec![0 as Word; ds.words.len()];
    for (new_pos, &old_row) in order.iter().enumerate() {
        sorted[new_pos * nw..(new_pos + 1) * nw]
            .copy_from_slice(&ds.words[old_row * nw..old_row * nw + nw]);
    }
    ds.words = sorted;
}

/// Removes consecutive duplicate rows (rows must already be sorted; a
/// duplicate is a row whose full `n_words`-word representation, attributes
/// and class both, matches its predecessor). Returns how many rows were
/// dropped.
pub fn dedupe_rows(ds: &mut Dataset) -> usize {
    let nw = ds.n_words;
    let n = ds.n_observations;
    if n == 0 {
        return 0;
    }

    let mut kept = 1usize;
    for read in 1..n {
        let is_duplicate = ds.words[(kept - 1) * nw..kept * nw] == ds.words[read * nw..(read + 1) * nw];
        if !is_duplicate {
            if kept != read {
                let (left, right) = ds.words.split_at_mut(read * nw);
                left[kept * nw..kept * nw + nw].copy_from_slice(&right[..nw]);
            }
            kept += 1;
        }
    }

    let removed = n - kept;
    ds.words.truncate(kept * nw);
    ds.n_observations = kept;
    removed
}

/// Compares the first `n_attributes` bits of two attribute-word slices.
fn attributes_equal(a: &[Word], b: &[Word], n_attributes: usize) -> bool {
    let full_words = n_attributes / 64;
    if a[..full_words] != b[..full_words] {
        return false;
    }
    let remaining = (n_attributes % 64) as u32;
    if remaining == 0 {
        return true;
    }
    crate::bits::get_bits(a[full_words], 0, remaining) == crate::bits::get_bits(b[full_words], 0, remaining)
}

/// Appends a JNSQ (join-non-same-qualification) field to every row: for each
/// row, counts how many immediately preceding rows share its attribute bits
/// (resetting to zero whenever the attribute bits change), records the
/// maximum such count across the dataset, sizes a field `J = ceil(log2(max +
/// 1))` bits wide, and writes every row's count into that field using
/// `encoding`. Requires rows to already be sorted (and usually deduplicated,
/// though this step does not depend on it beyond the counts it produces).
///
/// Unlike a per-row incremental width, the field width is fixed only after
/// this whole pass completes, so the write happens in a second pass over a
/// freshly sized row buffer. Returns the maximum JNSQ value observed.
pub fn add_jnsq_bits(ds: &mut Dataset, encoding: JnsqEncoding) -> Result<u64, ValidationError> {
    let n = ds.n_observations;
    let old_attributes = ds.n_attributes;
    let old_attr_words = Dataset::n_attr_words(old_attributes);
    let old_n_words = ds.n_words;

    let mut counts = vec![0u64; n];
    let mut max_jnsq = 0u64;
    for i in 1..n {
        let prev = &ds.words[(i - 1) * old_n_words..(i - 1) * old_n_words + old_attr_words];
        let cur = &ds.words[i * old_n_words..i * old_n_words + old_attr_words];
        counts[i] = if attributes_equal(cur, prev, old_attributes) {
            counts[i - 1] + 1
        } else {
            0
        };
        max_jnsq = max_jnsq.max(counts[i]);
    }

    let j_bits = bits_needed(max_jnsq as usize + 1);
    if j_bits > 64 {
        return Err(ValidationError::JnsqTooWide {
            needed: j_bits,
            word_bits: 64,
        });
    }

    let new_attributes = old_attributes + j_bits as usize;
    let new_attr_words = Dataset::n_attr_words(new_attributes);
    let new_n_words = new_attr_words + 1;

    let mut new_words = vec![0 as Word; n * new_n_words];
    for i in 0..n {
        let src = &ds.words[i * old_n_words..i * old_n_words + old_attr_words];
        new_words[i * new_n_words..i * new_n_words + old_attr_words].copy_from_slice(src);

        if j_bits > 0 {
            let mut value = counts[i];
            if j_bits > 1 && encoding == JnsqEncoding::Invert {
                value = invert_n_bits(value, j_bits);
            }
            write_field(
                &mut new_words[i * new_n_words..i * new_n_words + new_attr_words],
                old_attributes,
                j_bits,
                value,
            );
        }

        let class = ds.class_of(i);
        let class_word = i * new_n_words + new_n_words - 1;
        new_words[class_word] = crate::bits::set_bits(
            0,
            class as Word,
            crate::bits::WORD_BITS - ds.n_bits_for_class,
            ds.n_bits_for_class,
        );
    }

    ds.words = new_words;
    ds.n_attributes = new_attributes;
    ds.n_bits_for_jnsqs = j_bits;
    ds.n_words = new_n_words;

    Ok(max_jnsq)
}

/// Builds `ds.class_index` from the (by now sorted, class-contiguous) rows.
/// Must run after [`sort_rows`]/[`dedupe_rows`]; JNSQ assignment does not
/// disturb class contiguity so this can run before or after
/// [`add_jnsq_bits`].
pub fn index_classes(ds: &mut Dataset) -> Result<(), ValidationError> {
    let mut entries = vec![ClassEntry::default(); ds.n_classes];
    for row in 0..ds.n_observations {
        let class = ds.class_of(row);
        if class >= ds.n_classes {
            return Err(ValidationError::ClassOutOfRange {
                label: class,
                n_classes: ds.n_classes,
            });
        }
        if entries[class].count == 0 {
            entries[class].first = row;
        }
        entries[class].count += 1;
    }
    ds.class_index = entries;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset(rows: &[(&[bool], usize)], n_classes: usize) -> Dataset {
        let n_attributes = rows[0].0.len();
        let n_attr_words = Dataset::n_attr_words(n_attributes);
        let n_bits_for_class = bits_needed(n_classes);
        let n_words = n_attr_words + 1;
        let mut ds = Dataset {
            n_attributes,
            n_observations: rows.len(),
            n_classes,
            n_bits_for_class,
            n_bits_for_jnsqs: 0,
            n_words,
            words: vec![0; rows.len() * n_words],
            class_index: vec![],
        };
        for (row_idx, (bits, class)) in rows.iter().enumerate() {
            for (i, &bit) in bits.iter().enumerate() {
                if bit {
                    let word = row_idx * n_words + i / 64;
                    let shift = 63 - (i % 64) as u32;
                    ds.words[word] |= 1u64 << shift;
                }
            }
            let word = row_idx * n_words + n_attr_words;
            let at = 64 - n_bits_for_class;
            ds.words[word] = crate::bits::set_bits(0, *class as Word, at, n_bits_for_class);
        }
        ds
    }

    #[test]
    fn sort_rows_orders_lexicographically_by_full_row() {
        let mut ds = make_dataset(
            &[
                (&[true, false], 1),
                (&[false, false], 0),
                (&[false, true], 0),
            ],
            2,
        );
        sort_rows(&mut ds);
        assert_eq!(ds.class_of(0), 0);
        assert_eq!(ds.class_of(1), 0);
        assert_eq!(ds.class_of(2), 1);
    }

    #[test]
    fn dedupe_rows_drops_exact_repeats_and_keeps_distinct_classes() {
        let mut ds = make_dataset(
            &[
                (&[false, false], 0),
                (&[false, false], 0),
                (&[false, false], 1),
                (&[true, true], 1),
            ],
            2,
        );
        let removed = dedupe_rows(&mut ds);
        assert_eq!(removed, 1);
        assert_eq!(ds.n_observations, 3);
        assert_eq!(ds.class_of(0), 0);
        assert_eq!(ds.class_of(1), 1);
        assert_eq!(ds.class_of(2), 1);
    }

    #[test]
    fn add_jnsq_bits_sizes_the_field_to_the_max_run_length() {
        // Three rows share attribute bits [false,false] with classes 0,1,0;
        // the third repeat has an inconsistency count of 2.
        let mut ds = make_dataset(
            &[
                (&[false, false], 0),
                (&[false, false], 1),
                (&[false, false], 0),
                (&[true, true], 1),
            ],
            2,
        );
        let max_jnsq = add_jnsq_bits(&mut ds, JnsqEncoding::Identity).unwrap();
        assert_eq!(max_jnsq, 2);
        assert_eq!(ds.n_bits_for_jnsqs, 2); // ceil(log2(3)) = 2
        assert_eq!(ds.n_attributes, 4);
        // class labels must still read back correctly after the relayout.
        assert_eq!(ds.class_of(0), 0);
        assert_eq!(ds.class_of(1), 1);
        assert_eq!(ds.class_of(2), 0);
        assert_eq!(ds.class_of(3), 1);
    }

    #[test]
    fn add_jnsq_bits_is_a_noop_field_when_there_is_no_inconsistency() {
        let mut ds = make_dataset(&[(&[false, false], 0), (&[true, true], 1)], 2);
        let max_jnsq = add_jnsq_bits(&mut ds, JnsqEncoding::Invert).unwrap();
        assert_eq!(max_jnsq, 0);
        assert_eq!(ds.n_bits_for_jnsqs, 0);
        assert_eq!(ds.n_attributes, 2);
    }

    #[test]
    fn jnsq_field_width_is_capped_at_the_word_width() {
        // max_jnsq is itself a u64, so ceil(log2(max_jnsq + 1)) can reach at
        // most 64 and JnsqTooWide can never actually fire through
        // add_jnsq_bits on this target; what's worth pinning down is that
        // the boundary value itself (u64::MAX) still sizes to exactly 64
        // bits rather than overflowing bits_needed's arithmetic.
        assert_eq!(bits_needed(u64::MAX as usize), 64);
    }

    #[test]
    fn index_classes_finds_contiguous_ranges_after_sort() {
        let mut ds = make_dataset(
            &[
                (&[true, false], 1),
                (&[false, false], 0),
                (&[false, true], 0),
            ],
            2,
        );
        sort_rows(&mut ds);
        index_classes(&mut ds).unwrap();
        assert_eq!(ds.class_index[0], ClassEntry { first: 0, count: 2 });
        assert_eq!(ds.class_index[1], ClassEntry { first: 2, count: 1 });
    }

    #[test]
    fn jnsq_encoding_from_str_round_trips_display() {
        assert_eq!(JnsqEncoding::from_str("invert").unwrap(), JnsqEncoding::Invert);
        assert_eq!(JnsqEncoding::from_str("identity").unwrap(), JnsqEncoding::Identity);
        assert!(JnsqEncoding::from_str("bogus").is_err());
        assert_eq!(JnsqEncoding::Invert.to_string(), "invert");
    }
}
