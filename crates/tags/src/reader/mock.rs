//! In-memory tag reader for testing.

use crate::error::{ErrorKind, Result};
use crate::models::TagRecord;
use crate::reader::TagReader;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// What the [`MockReader`] should answer for a given path.
#[derive(Debug, Clone)]
pub enum MockTag {
    Tags(TagRecord),
    TagFailure,
    ReadFailure,
}

/// In-memory tag reader for testing.
///
/// Answers are configured per path; any path without an answer is a read
/// failure. Every call to [`read`](TagReader::read) is recorded, so tests can
/// assert exactly which files were (or weren't) re-read.
///
/// # Examples
///
/// ```
/// use tagdex_tags::{MockReader, MockTag, TagKind, TagReader, TagRecord};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let reader = MockReader::with_tags([
///     ("/music/song.mp3", MockTag::Tags(TagRecord::new(TagKind::Id3).with_title("Song"))),
/// ]);
/// let record = reader.read(Path::new("/music/song.mp3")).await.unwrap();
/// assert_eq!(record.title.as_deref(), Some("Song"));
/// assert_eq!(reader.reads().await.len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockReader {
    tags: RwLock<HashMap<PathBuf, MockTag>>,
    reads: RwLock<Vec<PathBuf>>,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: impl IntoIterator<Item = (impl Into<PathBuf>, MockTag)>) -> Self {
        Self {
            tags: RwLock::new(tags.into_iter().map(|(path, tag)| (path.into(), tag)).collect()),
            reads: RwLock::default(),
        }
    }

    /// Replace the answer for a path.
    pub async fn set(&self, path: impl Into<PathBuf>, tag: MockTag) {
        self.tags.write().await.insert(path.into(), tag);
    }

    /// Every path read so far, in order.
    pub async fn reads(&self) -> Vec<PathBuf> {
        self.reads.read().await.clone()
    }

    pub async fn clear_reads(&self) {
        self.reads.write().await.clear();
    }
}

#[async_trait]
impl TagReader for MockReader {
    async fn read(&self, path: &Path) -> Result<TagRecord> {
        self.reads.write().await.push(path.to_path_buf());
        match self.tags.read().await.get(path) {
            Some(MockTag::Tags(record)) => Ok(record.clone()),
            Some(MockTag::TagFailure) => exn::bail!(ErrorKind::Tag(path.to_path_buf())),
            Some(MockTag::ReadFailure) | None => exn::bail!(ErrorKind::Read(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TagKind;

    #[tokio::test]
    async fn test_unknown_path_is_read_failure() {
        let reader = MockReader::new();
        let err = reader.read(Path::new("/nope.mp3")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Read(PathBuf::from("/nope.mp3")));
        assert_eq!(reader.reads().await, vec![PathBuf::from("/nope.mp3")]);
    }

    #[tokio::test]
    async fn test_read_indexable_rejects_other_kinds() {
        let reader = MockReader::with_tags([
            ("/a.ogg", MockTag::Tags(TagRecord::new(TagKind::Other("VorbisComments".to_string())))),
            ("/b.mp3", MockTag::Tags(TagRecord::default())),
            ("/c.m4a", MockTag::Tags(TagRecord::new(TagKind::Mp4))),
        ]);
        let err = reader.read_indexable(Path::new("/a.ogg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedKind(_, kind) if kind == "VorbisComments"));
        let err = reader.read_indexable(Path::new("/b.mp3")).await.unwrap_err();
        assert!(err.is_tag_failure());
        assert!(reader.read_indexable(Path::new("/c.m4a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_replaces_answer() {
        let reader = MockReader::with_tags([("/a.mp3", MockTag::TagFailure)]);
        assert!(reader.read(Path::new("/a.mp3")).await.unwrap_err().is_tag_failure());
        reader.set("/a.mp3", MockTag::Tags(TagRecord::new(TagKind::Id3))).await;
        assert!(reader.read(Path::new("/a.mp3")).await.is_ok());
        reader.clear_reads().await;
        assert!(reader.reads().await.is_empty());
    }
}
