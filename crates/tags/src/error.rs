//! Tag Reading Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A tag reading error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tag reading operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The pipeline only cares about one distinction: was the *tag* the problem
/// (malformed, missing, unsupported) or was the *file* the problem (I/O,
/// library failure)? Both are recorded against the file, but they are logged
/// with different messages.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file was read but its tag structure was rejected.
    #[display("malformed or missing tag: {}", _0.display())]
    Tag(#[error(not(source))] PathBuf),
    /// The file was read and tagged, but with a tag family we don't index.
    #[display("unsupported tag type {_1}: {}", _0.display())]
    UnsupportedKind(PathBuf, #[error(not(source))] String),
    /// The file could not be read at all.
    #[display("could not read file: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if the failure was caused by the tag rather than the file.
    pub fn is_tag_failure(&self) -> bool {
        matches!(self, Self::Tag(_) | Self::UnsupportedKind(_, _))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A broken tag stays broken until the file is rewritten (and its
        // modification time changes), but I/O errors can be transient.
        matches!(self, Self::Read(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Tag(PathBuf::from("a.mp3")), true, false)]
    #[case(ErrorKind::UnsupportedKind(PathBuf::from("a.flac"), "VorbisComments".to_string()), true, false)]
    #[case(ErrorKind::Read(PathBuf::from("a.mp3")), false, true)]
    fn test_classification(#[case] kind: ErrorKind, #[case] tag: bool, #[case] retryable: bool) {
        assert_eq!(kind.is_tag_failure(), tag);
        assert_eq!(kind.is_retryable(), retryable);
    }

    #[test]
    fn test_error_from_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Read(PathBuf::from("gone.mp3")));
        let exn = err.unwrap_err();
        assert_eq!(*exn, ErrorKind::Read(PathBuf::from("gone.mp3")));
        assert_eq!((*exn).to_string(), "could not read file: gone.mp3");
    }
}
