//! The set of media files under a watch root, and a signal for when it changes.
//!
//! The indexing pipeline never looks at the filesystem tree itself. It asks a
//! [`Watcher`] for the current set of paths, consumes the watcher's "dirty"
//! signal to decide when to run, and tells the watcher when a path it reported
//! has vanished from disk.

mod directory;
pub mod error;

pub use crate::directory::{DirectoryWatcher, FileMeta, Refresh};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub type WatcherHandle = Arc<dyn Watcher>;

/// Extensions tracked when nothing else is configured.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["mp3", "m4a", "m4b", "mp4", "aac"];

/// Interface the indexing pipeline needs from a filesystem watcher.
///
/// All methods take `&self`; implementations are shared between the pipeline
/// task and whatever is feeding them filesystem events.
pub trait Watcher: Send + Sync {
    /// Absolute directory every tracked path lives under.
    fn root(&self) -> &Path;

    /// Whether there are filesystem changes that haven't been processed.
    fn is_dirty(&self) -> bool;

    fn set_dirty(&self, dirty: bool);

    /// Snapshot of every tracked path, sorted.
    fn paths(&self) -> Vec<PathBuf>;

    /// Stop tracking a path (it no longer exists on disk).
    fn remove(&self, path: &Path);

    /// The path relative to [`root`](Self::root), `/`-separated.
    ///
    /// Returns `None` for paths outside the root.
    fn clip(&self, path: &Path) -> Option<String> {
        clip(self.root(), path)
    }
}

/// Express `path` relative to `root` with `/` separators, whatever the platform.
///
/// ```
/// use std::path::Path;
/// use tagdex_watcher::clip;
///
/// assert_eq!(clip(Path::new("/music"), Path::new("/music/Band/Song.mp3")).as_deref(), Some("Band/Song.mp3"));
/// assert_eq!(clip(Path::new("/music"), Path::new("/podcasts/Episode.mp3")), None);
/// ```
pub fn clip(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            // Anything but plain segments means the path tried to escape.
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Returns `true` if the path's extension (case-insensitive) is in `extensions`.
pub fn is_media(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/music/song.mp3", Some("song.mp3"))]
    #[case("/music/a/b/c.m4a", Some("a/b/c.m4a"))]
    #[case("/music", None)]
    #[case("/other/song.mp3", None)]
    #[case("/music/../other/song.mp3", None)]
    fn test_clip(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(clip(Path::new("/music"), Path::new(path)).as_deref(), expected);
    }

    #[rstest]
    #[case("song.mp3", true)]
    #[case("song.MP3", true)]
    #[case("album/track.m4a", true)]
    #[case("cover.jpg", false)]
    #[case("README", false)]
    fn test_is_media(#[case] path: &str, #[case] expected: bool) {
        let extensions: Vec<String> = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        assert_eq!(is_media(Path::new(path), &extensions), expected);
    }
}
