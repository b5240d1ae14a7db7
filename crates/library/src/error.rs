//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Per-file problems found during a run are not errors: they're reported as a
//! [`FileOutcome`](crate::FileOutcome). What's left here is the machinery
//! failing around them.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A lookup or update via [`tagdex_cache::CacheStore`] failed.
    #[display("cache operation failed")]
    Cache,
    /// The index template could not be compiled or rendered.
    #[display("could not render index")]
    Template,
    /// Writing or removing one of the output files failed.
    #[display("could not write artifact: {}", _0.display())]
    Artifact(#[error(not(source))] PathBuf),
    /// A tracked file could not be examined before its tag was read.
    #[display("could not examine file: {}", _0.display())]
    File(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Artifact(_) | Self::File(_))
    }
}
