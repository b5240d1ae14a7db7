use serde::{Deserialize, Serialize};
use std::fmt;

/// The tag family a file was read with.
///
/// Only [`Id3`](Self::Id3) and [`Mp4`](Self::Mp4) are eligible for indexing;
/// anything else is reported as an unsupported tag by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// ID3v1 or ID3v2 (MP3 and friends).
    Id3,
    /// iTunes-style MP4 `ilst` atoms (M4A, M4B, MP4, AAC).
    Mp4,
    /// Any other tag family, named as the extraction library reports it.
    Other(String),
}
impl TagKind {
    pub fn is_indexable(&self) -> bool {
        matches!(self, Self::Id3 | Self::Mp4)
    }
}
impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id3 => f.write_str("ID3"),
            Self::Mp4 => f.write_str("MP4"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Raw tag fields as returned by a [`TagReader`](crate::TagReader).
///
/// Every field is optional: a file that has a tag but no artist frame is still
/// a successful read, it just won't pass [`is_valid`](crate::is_valid) later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRecord {
    pub kind: Option<TagKind>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
}
impl TagRecord {
    pub fn new(kind: TagKind) -> Self {
        Self { kind: Some(kind), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_track(mut self, track: u32) -> Self {
        self.track = Some(track);
        self
    }

    /// Combine the raw tag with the file's path relative to the watch root.
    pub fn into_data(self, clipped_path: impl Into<String>) -> TagData {
        TagData {
            name: self.title,
            album: self.album,
            track: self.track,
            artist: self.artist,
            clipped_path: clipped_path.into(),
        }
    }

    /// Human label used for progress reporting ("Title - Artist").
    pub fn label(&self) -> String {
        match (self.title.as_deref(), self.artist.as_deref()) {
            (Some(title), Some(artist)) => format!("{title} - {artist}"),
            (Some(title), None) => title.to_string(),
            (None, Some(artist)) => artist.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Tag fields as cached against a file and exposed in the index artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    pub name: Option<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
    pub artist: Option<String>,
    /// Path relative to the watch root, always `/`-separated.
    pub clipped_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TagKind::Id3, true)]
    #[case(TagKind::Mp4, true)]
    #[case(TagKind::Other("VorbisComments".to_string()), false)]
    fn test_indexable(#[case] kind: TagKind, #[case] expected: bool) {
        assert_eq!(kind.is_indexable(), expected);
    }

    #[rstest]
    #[case(TagRecord::new(TagKind::Id3).with_title("Song").with_artist("Band"), "Song - Band")]
    #[case(TagRecord::new(TagKind::Id3).with_title("Song"), "Song")]
    #[case(TagRecord::new(TagKind::Mp4).with_artist("Band"), "Band")]
    #[case(TagRecord::new(TagKind::Mp4), "")]
    fn test_label(#[case] record: TagRecord, #[case] expected: &str) {
        assert_eq!(record.label(), expected);
    }

    #[test]
    fn test_into_data() {
        let data = TagRecord::new(TagKind::Id3)
            .with_title("Song")
            .with_artist("Band")
            .with_album("Record")
            .with_track(3)
            .into_data("Band/Record/03 Song.mp3");
        assert_eq!(data.name.as_deref(), Some("Song"));
        assert_eq!(data.track, Some(3));
        assert_eq!(data.clipped_path, "Band/Record/03 Song.mp3");
    }
}
