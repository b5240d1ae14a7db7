use crate::models::TagData;

/// Decides whether a tag is complete enough to be indexed.
///
/// Name, album, artist and the clipped path must all be present and contain
/// something other than whitespace. The track number is deliberately not
/// required: plenty of rips never set it.
///
/// ```
/// use tagdex_tags::{TagKind, TagRecord, is_valid};
///
/// let tag = TagRecord::new(TagKind::Id3).with_title("Song").with_artist("Band").with_album("Record");
/// assert!(is_valid(&tag.clone().into_data("Band/Song.mp3")));
/// assert!(!is_valid(&tag.into_data("")));
/// ```
pub fn is_valid(tag: &TagData) -> bool {
    fn present(field: Option<&str>) -> bool {
        field.is_some_and(|value| !value.trim().is_empty())
    }
    present(tag.name.as_deref())
        && present(tag.album.as_deref())
        && present(tag.artist.as_deref())
        && present(Some(tag.clipped_path.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TagKind, TagRecord};
    use rstest::rstest;

    fn complete() -> TagRecord {
        TagRecord::new(TagKind::Id3).with_title("Song").with_artist("Band").with_album("Record")
    }

    #[test]
    fn test_complete_tag_is_valid() {
        assert!(is_valid(&complete().into_data("song.mp3")));
    }

    #[test]
    fn test_track_is_not_required() {
        let tag = complete().into_data("song.mp3");
        assert_eq!(tag.track, None);
        assert!(is_valid(&tag));
    }

    #[rstest]
    #[case::missing_name(TagRecord { title: None, ..complete() }, "song.mp3")]
    #[case::missing_artist(TagRecord { artist: None, ..complete() }, "song.mp3")]
    #[case::missing_album(TagRecord { album: None, ..complete() }, "song.mp3")]
    #[case::blank_artist(TagRecord { artist: Some("  ".to_string()), ..complete() }, "song.mp3")]
    #[case::empty_name(TagRecord { title: Some(String::new()), ..complete() }, "song.mp3")]
    #[case::missing_path(complete(), "")]
    fn test_incomplete_tag_is_invalid(#[case] record: TagRecord, #[case] path: &str) {
        assert!(!is_valid(&record.into_data(path)));
    }
}
