//! The error kinds surfaced by ingest, validation, preprocessing, the
//! dataset source and the cover engine. Every fallible core operation
//! returns `Result<_, LaidError>`; none of them are recovered locally, they
//! propagate to the binary's exit status.

use thiserror::Error;

/// A dataset or file-format problem discovered while reading a
/// [`crate::source::DatasetSource`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset '{0}' not found in container")]
    MissingDataset(String),
    #[error("required attribute '{0}' missing on dataset")]
    MissingAttribute(&'static str),
    #[error("container declares {declared} observations but the row data holds {actual}")]
    RowCountMismatch { declared: usize, actual: usize },
    #[error("container is not a recognised dataset file: {0}")]
    BadContainer(String),
}

/// A dataset that fails a structural invariant (too few classes, too few
/// observations, a class label outside the valid range, a JNSQ field wider
/// than a word).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("n_classes must be >= 2, got {0}")]
    TooFewClasses(usize),
    #[error("n_observations must be >= 2, got {0}")]
    TooFewObservations(usize),
    #[error("n_attributes must be >= 1, got {0}")]
    TooFewAttributes(usize),
    #[error("class label {label} out of range [0, {n_classes})")]
    ClassOutOfRange { label: usize, n_classes: usize },
    #[error("jnsq needs {needed} bits but the word width is only {word_bits}")]
    JnsqTooWide { needed: u32, word_bits: u32 },
}

/// A failure allocating or sizing the node-shared dataset buffer.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("dataset size computation overflowed (R={observations}, N_words={n_words})")]
    SizeOverflow { observations: usize, n_words: usize },
}

/// A failure of a collective primitive (reduction/broadcast/barrier) during
/// the main cover-engine loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("worker panicked or disconnected mid-collective")]
    WorkerLost,
    #[error("reduction buffer length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// The top-level error type returned by every fallible entry point in this
/// crate, and the one the binary prints and maps to a nonzero exit status.
#[derive(Debug, Error)]
pub enum LaidError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
