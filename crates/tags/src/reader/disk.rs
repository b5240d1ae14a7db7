//! Tag reader backed by [`lofty`].

use crate::error::{ErrorKind, Result};
use crate::models::{TagKind, TagRecord};
use crate::reader::TagReader;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use lofty::error::{ErrorKind as LoftyErrorKind, LoftyError};
use lofty::file::TaggedFile;
use lofty::prelude::{Accessor, TaggedFileExt};
use lofty::tag::TagType;
use std::path::Path;
use tracing::instrument;

/// Reads tags from files on the local filesystem using [`lofty`].
///
/// Parsing is synchronous, so every read is moved onto Tokio's blocking pool
/// to keep the pipeline's task responsive.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl LoftyReader {
    pub fn new() -> Self {
        Self
    }

    fn classify(err: &LoftyError, path: &Path) -> ErrorKind {
        match err.kind() {
            LoftyErrorKind::Io(_) => ErrorKind::Read(path.to_path_buf()),
            _ => ErrorKind::Tag(path.to_path_buf()),
        }
    }

    fn kind(tag_type: TagType) -> TagKind {
        match tag_type {
            TagType::Id3v1 | TagType::Id3v2 => TagKind::Id3,
            TagType::Mp4Ilst => TagKind::Mp4,
            other => TagKind::Other(format!("{other:?}")),
        }
    }

    fn record(file: &TaggedFile, path: &Path) -> Result<TagRecord> {
        let tag = file
            .primary_tag()
            .or_else(|| file.first_tag())
            .ok_or_raise(|| ErrorKind::Tag(path.to_path_buf()))?;
        Ok(TagRecord {
            kind: Some(Self::kind(tag.tag_type())),
            title: tag.title().map(|s| s.into_owned()),
            artist: tag.artist().map(|s| s.into_owned()),
            album: tag.album().map(|s| s.into_owned()),
            track: tag.track(),
        })
    }
}

#[async_trait]
impl TagReader for LoftyReader {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read(&self, path: &Path) -> Result<TagRecord> {
        let owned = path.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || lofty::read_from_path(owned))
            .await
            .or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        let file = match parsed {
            Ok(file) => file,
            Err(err) => {
                let kind = Self::classify(&err, path);
                return Err(err).or_raise(|| kind);
            },
        };
        Self::record(&file, path)
    }
}
