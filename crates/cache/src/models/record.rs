use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use std::path::PathBuf;
use tagdex_tags::{TagData, is_valid};

/// Everything the cache knows about one file, keyed by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Modification time as last observed. Compared as an opaque string: two
    /// timestamps are the same only if their string forms are identical.
    pub mtime: Option<String>,
    /// Absent when the last read failed.
    pub tag_data: Option<TagData>,
    pub is_valid: bool,
    /// Changed during a run and not yet folded into a rebuilt index.
    pub dirty: bool,
}
impl FileRecord {
    /// A freshly read tag: validated, and dirty until the next rebuild.
    pub fn indexed(path: impl Into<PathBuf>, mtime: Option<String>, tag_data: TagData) -> Self {
        Self {
            path: path.into(),
            mtime,
            is_valid: is_valid(&tag_data),
            tag_data: Some(tag_data),
            dirty: true,
        }
    }

    /// A failed read. Not dirty: a failure on its own never forces a rebuild.
    pub fn failed(path: impl Into<PathBuf>, mtime: Option<String>) -> Self {
        Self {
            path: path.into(),
            mtime,
            tag_data: None,
            is_valid: false,
            dirty: false,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) path: String,
    #[sqlx(default)]
    pub(crate) mtime: Option<String>,
    pub(crate) tagged: bool,
    #[sqlx(default)]
    pub(crate) name: Option<String>,
    #[sqlx(default)]
    pub(crate) album: Option<String>,
    #[sqlx(default)]
    pub(crate) track: Option<i64>,
    #[sqlx(default)]
    pub(crate) artist: Option<String>,
    #[sqlx(default)]
    pub(crate) clipped_path: Option<String>,
    pub(crate) is_valid: bool,
    pub(crate) dirty: bool,
}
impl TryFrom<&FileRecord> for FileRow {
    type Error = Error;
    fn try_from(record: &FileRecord) -> Result<Self, Self::Error> {
        let tag = record.tag_data.as_ref();
        Ok(Self {
            path: record.path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            mtime: record.mtime.clone(),
            tagged: tag.is_some(),
            name: tag.and_then(|t| t.name.clone()),
            album: tag.and_then(|t| t.album.clone()),
            track: tag.and_then(|t| t.track).map(i64::from),
            artist: tag.and_then(|t| t.artist.clone()),
            clipped_path: tag.map(|t| t.clipped_path.clone()),
            is_valid: record.is_valid,
            dirty: record.dirty,
        })
    }
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let tag_data = if row.tagged {
            Some(TagData {
                name: row.name,
                album: row.album,
                track: row.track.map(u32::try_from).transpose().or_raise(|| ErrorKind::InvalidData("track"))?,
                artist: row.artist,
                clipped_path: row.clipped_path.ok_or_raise(|| ErrorKind::InvalidData("clipped path"))?,
            })
        } else {
            None
        };
        Ok(Self {
            path: PathBuf::from(row.path),
            mtime: row.mtime,
            tag_data,
            is_valid: row.is_valid,
            dirty: row.dirty,
        })
    }
}
