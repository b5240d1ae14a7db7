//! The index artifact and its status marker.
//!
//! The index is an XML document rendered through an [upon] template:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <library date="1700000000000">
//!   <track album="Record" artist="Band" name="Song" path="Band/Record/01 Song.mp3"/>
//! </library>
//! ```
//!
//! `date` is the build time in epoch milliseconds. The status marker is the
//! JSON document `{"date": 1700000000000}` carrying the same timestamp, so
//! remote consumers can poll for freshness without downloading the index.

use crate::artifacts::write_atomic;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tagdex_tags::{TagData, is_valid};
use time::UtcDateTime;
use tracing::instrument;
use upon::{Engine, Template};

const INDEX_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<library date="{{ date }}">
{% for track in tracks %}  <track album="{{ track.album|xml }}" artist="{{ track.artist|xml }}" name="{{ track.name|xml }}" path="{{ track.path|xml }}"/>
{% endfor %}</library>
"#;

/// One `<track>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub album: String,
    pub artist: String,
    pub name: String,
    /// Path relative to the watch root.
    pub path: String,
}
impl IndexEntry {
    /// `None` unless the tag is complete enough to be indexed.
    pub fn from_tag(tag: &TagData) -> Option<Self> {
        if !is_valid(tag) {
            return None;
        }
        Some(Self {
            album: tag.album.clone()?,
            artist: tag.artist.clone()?,
            name: tag.name.clone()?,
            path: tag.clipped_path.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    /// Build time, epoch milliseconds.
    pub date: i64,
    pub tracks: Vec<IndexEntry>,
}
impl IndexDocument {
    /// A document stamped with the current time, tracks ordered by path.
    pub fn new(mut tracks: Vec<IndexEntry>) -> Self {
        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        Self { date: now_millis(), tracks }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMarker {
    pub date: i64,
}

pub(crate) fn now_millis() -> i64 {
    i64::try_from(UtcDateTime::now().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Renders [`IndexDocument`]s and writes them, with their status marker.
pub struct IndexWriter {
    engine: Engine<'static>,
    template: Template<'static>,
    index: PathBuf,
    status: PathBuf,
}
impl IndexWriter {
    pub fn new(index: impl Into<PathBuf>, status: impl Into<PathBuf>) -> Result<Self> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        // Compile up front so a broken template fails construction, not a run.
        let template = engine.compile(INDEX_TEMPLATE).or_raise(|| ErrorKind::Template)?;
        Ok(Self {
            engine,
            template,
            index: index.into(),
            status: status.into(),
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index
    }

    pub fn status_path(&self) -> &Path {
        &self.status
    }

    pub fn render(&self, document: &IndexDocument) -> Result<String> {
        self.template.render(&self.engine, document).to_string().or_raise(|| ErrorKind::Template)
    }

    /// Write the index, then the status marker with the same timestamp.
    #[instrument(skip_all, fields(index = %self.index.display(), tracks = document.tracks.len()))]
    pub async fn write(&self, document: &IndexDocument) -> Result<()> {
        let xml = self.render(document)?;
        write_atomic(&self.index, xml).await?;
        let status = serde_json::to_vec(&StatusMarker { date: document.date })
            .or_raise(|| ErrorKind::Artifact(self.status.clone()))?;
        write_atomic(&self.status, status).await?;
        tracing::info!(date = document.date, "Index rebuilt");
        Ok(())
    }
}

mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Escapes strings for use inside a double-quoted XML attribute.
    ///
    /// Characters XML 1.0 doesn't allow at all are dropped. Tab, newline and
    /// carriage return become character references, since parsers would
    /// otherwise normalize them to spaces.
    fn xml_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                for c in s.chars() {
                    match c {
                        '&' => f.write_str("&amp;")?,
                        '<' => f.write_str("&lt;")?,
                        '>' => f.write_str("&gt;")?,
                        '"' => f.write_str("&quot;")?,
                        '\'' => f.write_str("&apos;")?,
                        '\t' | '\n' | '\r' => write!(f, "&#{};", u32::from(c))?,
                        '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => {},
                        c => f.write_char(c)?,
                    }
                }
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(super) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("xml", xml_formatter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagdex_tags::{TagKind, TagRecord};

    fn entry(path: &str) -> IndexEntry {
        IndexEntry {
            album: "Record".to_string(),
            artist: "Band".to_string(),
            name: "Song".to_string(),
            path: path.to_string(),
        }
    }

    fn writer(dir: &Path) -> IndexWriter {
        IndexWriter::new(dir.join("index.xml"), dir.join("status.json")).unwrap()
    }

    #[test]
    fn test_render_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let xml = writer(dir.path()).render(&IndexDocument { date: 42, tracks: vec![] }).unwrap();
        assert_eq!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<library date=\"42\">\n</library>\n");
    }

    #[test]
    fn test_render_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let document = IndexDocument { date: 1700000000000, tracks: vec![entry("Band/Song.mp3")] };
        let xml = writer(dir.path()).render(&document).unwrap();
        assert_eq!(
            xml,
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<library date=\"1700000000000\">\n",
                "  <track album=\"Record\" artist=\"Band\" name=\"Song\" path=\"Band/Song.mp3\"/>\n",
                "</library>\n",
            )
        );
    }

    #[test]
    fn test_render_escapes_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let track = IndexEntry {
            album: "Rock & Roll".to_string(),
            artist: "\"Weird\" <Al>".to_string(),
            ..entry("a.mp3")
        };
        let xml = writer(dir.path()).render(&IndexDocument { date: 1, tracks: vec![track] }).unwrap();
        assert!(xml.contains("album=\"Rock &amp; Roll\""));
        assert!(xml.contains("artist=\"&quot;Weird&quot; &lt;Al&gt;\""));
    }

    #[test]
    fn test_render_drops_characters_xml_forbids() {
        let dir = tempfile::tempdir().unwrap();
        let track = IndexEntry {
            name: "Song\u{0}Title\u{1b}".to_string(),
            album: "Side A\tSide B\n".to_string(),
            ..entry("a.mp3")
        };
        let xml = writer(dir.path()).render(&IndexDocument { date: 1, tracks: vec![track] }).unwrap();
        assert!(xml.contains("name=\"SongTitle\""), "{xml}");
        assert!(xml.contains("album=\"Side A&#9;Side B&#10;\""), "{xml}");
        assert!(!xml.chars().any(|c| c < ' ' && c != '\n'));
    }

    #[test]
    fn test_document_sorts_by_path() {
        let document = IndexDocument::new(vec![entry("b.mp3"), entry("a.mp3")]);
        let paths: Vec<_> = document.tracks.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["a.mp3", "b.mp3"]);
        assert!(document.date > 0);
    }

    #[test]
    fn test_entry_requires_valid_tag() {
        let full = TagRecord::new(TagKind::Id3).with_title("Song").with_artist("Band").with_album("Record");
        assert_eq!(IndexEntry::from_tag(&full.clone().into_data("Band/Song.mp3")), Some(entry("Band/Song.mp3")));
        let no_artist = TagRecord { artist: None, ..full };
        assert_eq!(IndexEntry::from_tag(&no_artist.into_data("Band/Song.mp3")), None);
    }

    #[tokio::test]
    async fn test_write_stamps_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        let document = IndexDocument::new(vec![entry("a.mp3")]);
        writer.write(&document).await.unwrap();
        let xml = std::fs::read_to_string(writer.index_path()).unwrap();
        assert!(xml.contains(&format!("<library date=\"{}\">", document.date)));
        let status: StatusMarker = serde_json::from_slice(&std::fs::read(writer.status_path()).unwrap()).unwrap();
        assert_eq!(status.date, document.date);
    }
}
