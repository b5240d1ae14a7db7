//! Tag reader trait and implementations.
//!
//! The extraction library is treated as a black box: hand it a path, get back
//! a [`TagRecord`] or an error. Implementations normalise whatever the library
//! reports into [`ErrorKind::Tag`] (the tag is the problem) or
//! [`ErrorKind::Read`] (the file is the problem).

#[cfg(feature = "lofty")]
mod disk;
#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "lofty")]
pub use self::disk::LoftyReader;
#[cfg(feature = "mock")]
pub use self::mock::{MockReader, MockTag};
use crate::error::{ErrorKind, Result};
use crate::models::TagRecord;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface over a tag extraction library.
///
/// Reads may block on I/O for as long as the library likes; there is no
/// timeout. Callers that need ordering (the indexing pipeline does) should
/// await each read before starting the next.
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Read whatever tag the file carries, regardless of its family.
    async fn read(&self, path: &Path) -> Result<TagRecord>;

    /// Read a tag and reject any family that isn't eligible for indexing.
    ///
    /// A successful read of an unsupported tag family (or of a file with no
    /// identifiable family) is turned into a tag failure, so callers only have
    /// to deal with two outcomes.
    async fn read_indexable(&self, path: &Path) -> Result<TagRecord> {
        let record = self.read(path).await?;
        match &record.kind {
            Some(kind) if kind.is_indexable() => Ok(record),
            Some(kind) => exn::bail!(ErrorKind::UnsupportedKind(path.to_path_buf(), kind.to_string())),
            None => exn::bail!(ErrorKind::Tag(path.to_path_buf())),
        }
    }
}
