//! The `DatasetSource` trait and its built-in implementations.
//!
//! This is the I/O collaborator the core is deliberately decoupled from: the
//! on-disk container is treated as a hierarchical typed file (the bit-exact
//! format is out of scope for the core), so all the core depends on is this
//! trait. Two implementations ship with the crate: a plain
//! self-describing binary reader (no external runtime dependency, used by
//! the test suite and as the default), and an HDF5-backed reader behind the
//! `hdf5` cargo feature for interop with files produced by the hierarchical
//! file family the container belongs to.

use std::io::{self, Read};
use std::path::Path;

use crate::bits::{get_bits, read_field, Word, WORD_BITS};
use crate::dataset::Dataset;
use crate::error::IngestError;

/// The three required file-level attributes on a dataset container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetMeta {
    pub n_attributes: usize,
    pub n_observations: usize,
    pub n_classes: usize,
}

/// A source of dataset rows. Implementors need not hold the whole file in
/// memory, but the built-in reader does: the core assumes the whole dataset
/// fits in a worker's RAM, so there is no streaming contract to honor on the
/// way in either.
pub trait DatasetSource {
    /// Reads the container's required attributes once, before any row.
    fn meta(&mut self) -> Result<DatasetMeta, IngestError>;

    /// Reads the next row's attribute bits into `attr_words` (which is
    /// exactly `Dataset::n_attr_words(n_attributes)` words long, MSB-packed,
    /// zero-padded past `n_attributes`) and returns the row's class label.
    fn next_row(&mut self, attr_words: &mut [Word]) -> Result<usize, IngestError>;
}

const MAGIC: &[u8; 4] = b"LAID";
const FORMAT_VERSION: u8 = 1;

/// The plain binary container this crate reads and writes by default: a
/// magic, a dataset name, the three required attributes, and the row-major
/// word matrix with attribute bits followed by the class bits packed into
/// the tail of the attribute region (no JNSQ bits — those are derived at
/// preprocessing time, not stored on disk).
pub struct BinaryFileSource {
    meta: DatasetMeta,
    n_bits_for_class: u32,
    n_words_in_file: usize,
    rows: Vec<Word>,
    next_row: usize,
}

impl BinaryFileSource {
    /// Opens `path` and checks that it contains a dataset named `dataset`.
    pub fn open(path: &Path, dataset: &str) -> Result<Self, IngestError> {
        let mut file = std::fs::File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Self::from_bytes(&buf, dataset)
    }

    fn from_bytes(buf: &[u8], dataset: &str) -> Result<Self, IngestError> {
        let mut cursor = Cursor { buf, pos: 0 };

        let magic = cursor.take(4)?;
        if magic != MAGIC {
            return Err(IngestError::BadContainer("bad magic".into()));
        }
        let version = cursor.u8()?;
        if version != FORMAT_VERSION {
            return Err(IngestError::BadContainer(format!(
                "unsupported format version {version}"
            )));
        }

        let name_len = cursor.u16()? as usize;
        let name_bytes = cursor.take(name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|e| IngestError::BadContainer(e.to_string()))?;
        if name != dataset {
            return Err(IngestError::MissingDataset(dataset.to_string()));
        }

        let n_classes = cursor.u32()? as usize;
        let n_observations = cursor.u32()? as usize;
        let n_attributes = cursor.u32()? as usize;

        let n_bits_for_class = crate::dataset::bits_needed(n_classes.max(2));
        let n_bits_total = n_attributes + n_bits_for_class as usize;
        let n_words_in_file = n_bits_total.div_ceil(WORD_BITS as usize);

        let expected_words = n_observations
            .checked_mul(n_words_in_file)
            .ok_or_else(|| IngestError::BadContainer("row count overflow".into()))?;
        let mut rows = Vec::with_capacity(expected_words);
        for _ in 0..expected_words {
            rows.push(cursor.u64()?);
        }

        Ok(BinaryFileSource {
            meta: DatasetMeta {
                n_attributes,
                n_observations,
                n_classes,
            },
            n_bits_for_class,
            n_words_in_file,
            rows,
            next_row: 0,
        })
    }
}

impl DatasetSource for BinaryFileSource {
    fn meta(&mut self) -> Result<DatasetMeta, IngestError> {
        Ok(self.meta)
    }

    fn next_row(&mut self, attr_words: &mut [Word]) -> Result<usize, IngestError> {
        if self.next_row >= self.meta.n_observations {
            return Err(IngestError::RowCountMismatch {
                declared: self.meta.n_observations,
                actual: self.next_row,
            });
        }
        let row_start = self.next_row * self.n_words_in_file;
        let row = &self.rows[row_start..row_start + self.n_words_in_file];

        let n_attr_words = Dataset::n_attr_words(self.meta.n_attributes);
        attr_words[..n_attr_words].copy_from_slice(&row[..n_attr_words]);
        // Zero out the tail bits of the last attribute word that actually
        // belong to the class field, not to an attribute.
        let remaining = (self.meta.n_attributes % WORD_BITS as usize) as u32;
        if remaining != 0 {
            let last = n_attr_words - 1;
            let kept = get_bits(attr_words[last], 0, remaining);
            attr_words[last] = crate::bits::set_bits(0, kept, 0, remaining);
        }

        let class =
            read_field(row, self.meta.n_attributes, self.n_bits_for_class) as usize;

        self.next_row += 1;
        Ok(class)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], IngestError> {
        if self.pos + n > self.buf.len() {
            return Err(IngestError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
    fn u8(&mut self) -> Result<u8, IngestError> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<u16, IngestError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
    fn u32(&mut self) -> Result<u32, IngestError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn u64(&mut self) -> Result<u64, IngestError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}


#[cfg(feature = "hdf5")]
pub mod hdf5_source {
    //! An HDF5-backed [`DatasetSource`], behind the `hdf5` cargo feature.
    //! Reads the bit-exact on-disk dataset container produced by the
    //! hierarchical file family; its internals are not part of the core, and
    //! this module is the only place `hdf5` is referenced.

    use super::*;

    pub struct Hdf5Source {
        dataset: hdf5::Dataset,
        meta: DatasetMeta,
        data: ndarray::Array2<u64>,
        n_bits_for_class: u32,
        n_words_in_file: usize,
        next_row: usize,
    }

    impl Hdf5Source {
        pub fn open(path: &std::path::Path, dataset_name: &str) -> Result<Self, IngestError> {
            let file = hdf5::File::open(path)
                .map_err(|e| IngestError::BadContainer(e.to_string()))?;
            let dataset = file
                .dataset(dataset_name)
                .map_err(|_| IngestError::MissingDataset(dataset_name.to_string()))?;

            let n_classes = dataset
                .attr("n_classes")
                .and_then(|a| a.read_scalar::<u32>())
                .map_err(|_| IngestError::MissingAttribute("n_classes"))? as usize;
            let n_observations = dataset
                .attr("n_observations")
                .and_then(|a| a.read_scalar::<u32>())
                .map_err(|_| IngestError::MissingAttribute("n_observations"))?
                as usize;
            let n_attributes = dataset
                .attr("n_attributes")
                .and_then(|a| a.read_scalar::<u32>())
                .map_err(|_| IngestError::MissingAttribute("n_attributes"))?
                as usize;

            let data: ndarray::Array2<u64> = dataset
                .read_2d()
                .map_err(|e| IngestError::BadContainer(e.to_string()))?;
            if data.nrows() != n_observations {
                return Err(IngestError::RowCountMismatch {
                    declared: n_observations,
                    actual: data.nrows(),
                });
            }

            let n_bits_for_class = crate::dataset::bits_needed(n_classes.max(2));
            let n_words_in_file = data.ncols();

            Ok(Self {
                dataset,
                meta: DatasetMeta {
                    n_attributes,
                    n_observations,
                    n_classes,
                },
                data,
                n_bits_for_class,
                n_words_in_file,
                next_row: 0,
            })
        }
    }

    impl DatasetSource for Hdf5Source {
        fn meta(&mut self) -> Result<DatasetMeta, IngestError> {
            let _ = &self.dataset;
            Ok(self.meta)
        }

        fn next_row(&mut self, attr_words: &mut [Word]) -> Result<usize, IngestError> {
            if self.next_row >= self.meta.n_observations {
                return Err(IngestError::RowCountMismatch {
                    declared: self.meta.n_observations,
                    actual: self.next_row,
                });
            }
            let row = self.data.row(self.next_row);
            let n_attr_words = Dataset::n_attr_words(self.meta.n_attributes);
            for (w, value) in attr_words.iter_mut().zip(row.iter()).take(n_attr_words) {
                *w = *value;
            }
            let remaining = (self.meta.n_attributes % WORD_BITS as usize) as u32;
            if remaining != 0 {
                let last = n_attr_words - 1;
                let kept = get_bits(attr_words[last], 0, remaining);
                attr_words[last] = crate::bits::set_bits(0, kept, 0, remaining);
            }
            let words: Vec<Word> = row.iter().copied().take(self.n_words_in_file).collect();
            let class = read_field(&words, self.meta.n_attributes, self.n_bits_for_class) as usize;
            self.next_row += 1;
            Ok(class)
        }
    }
}
