//! Watcher that discovers media files by walking the watch root.
//!
//! There's no OS-level event subscription here: [`DirectoryWatcher::refresh`]
//! walks the whole tree and compares what it finds against what it knew. The
//! embedding application decides how often that happens.

use crate::error::{ErrorKind, Result};
use crate::{DEFAULT_EXTENSIONS, Watcher, is_media};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use tokio::fs::{self, DirEntry};
use tracing::instrument;

type WalkStream<'a> = Pin<Box<dyn Stream<Item = Result<(PathBuf, FileMeta)>> + Send + 'a>>;

enum WalkEntry {
    File(PathBuf, FileMeta),
    Descend(PathBuf),
    Skip,
}

/// What the watcher knows about a tracked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub modified: Option<SystemTime>,
}
impl From<&Metadata> for FileMeta {
    fn from(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

/// Differences found by a [`DirectoryWatcher::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Refresh {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}
impl Refresh {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}

/// Tracks the media files under a directory.
///
/// # Examples
///
/// ```no_run
/// use tagdex_watcher::{DirectoryWatcher, Watcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let watcher = DirectoryWatcher::new("/absolute/path/to/music")?;
/// let changes = watcher.refresh().await;
/// if watcher.is_dirty() {
///     println!("{} new files", changes.added);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DirectoryWatcher {
    root: PathBuf,
    extensions: Vec<String>,
    files: RwLock<BTreeMap<PathBuf, FileMeta>>,
    dirty: AtomicBool,
}
impl DirectoryWatcher {
    /// Create a watcher for the default media extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not an absolute path to an existing
    /// directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_extensions(root, DEFAULT_EXTENSIONS)
    }

    pub fn with_extensions(root: impl AsRef<Path>, extensions: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        Ok(Self {
            root,
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().trim().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            files: RwLock::default(),
            dirty: AtomicBool::new(false),
        })
    }

    /// Start tracking a single file, as if a filesystem event reported it.
    pub async fn track(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if crate::clip(&self.root, path).is_none() {
            exn::bail!(ErrorKind::OutsideRoot(path.to_path_buf()));
        }
        let metadata = fs::metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        let meta = FileMeta::from(&metadata);
        self.files.write().unwrap_or_else(PoisonError::into_inner).insert(path.to_path_buf(), meta);
        self.set_dirty(true);
        Ok(())
    }

    /// Walk the root and reconcile the tracked set with what's on disk.
    ///
    /// Raises the dirty signal if anything was added, removed or changed.
    /// Entries that can't be read are logged and left out; a single bad
    /// directory doesn't stop the walk.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn refresh(&self) -> Refresh {
        let mut found = BTreeMap::new();
        let mut walk = self.walk();
        while let Some(entry) = walk.next().await {
            match entry {
                Ok((path, meta)) => {
                    found.insert(path, meta);
                },
                Err(err) => tracing::warn!(error = ?err, "Skipping unreadable entry"),
            }
        }

        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let mut refresh = Refresh::default();
        for (path, meta) in &found {
            match files.get(path) {
                None => refresh.added += 1,
                Some(known) if known != meta => refresh.changed += 1,
                Some(_) => {},
            }
        }
        refresh.removed = files.keys().filter(|path| !found.contains_key(*path)).count();
        if !refresh.is_empty() {
            tracing::debug!(added = refresh.added, removed = refresh.removed, changed = refresh.changed, "Watch root changed");
            *files = found;
            self.set_dirty(true);
        }
        refresh
    }

    /// Iterative depth-first walk, yielding every media file under the root.
    ///
    /// Linked directories are followed, but each directory is listed at most
    /// once (by its canonical path), so cyclic links end the descent.
    fn walk(&self) -> WalkStream<'_> {
        let mut stack = vec![self.root.clone()];
        let mut visited = HashSet::new();
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                match fs::canonicalize(&current).await {
                    Ok(real) => {
                        if !visited.insert(real) {
                            tracing::debug!(path = %current.display(), "Directory already walked; skipping");
                            continue 'dirs;
                        }
                    },
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                        continue 'dirs;
                    },
                }
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Directory vanished between listing and descending.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                        continue 'dirs;
                    },
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(ErrorKind::from_io(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(path, meta)) => yield Ok((path, meta)),
                        Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        // Follows symlinks; the walk guards against revisiting directories.
        let metadata = fs::metadata(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() && is_media(&path, &self.extensions) {
            return Ok(WalkEntry::File(path, FileMeta::from(&metadata)));
        }
        Ok(WalkEntry::Skip)
    }
}

impl Watcher for DirectoryWatcher {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    fn paths(&self) -> Vec<PathBuf> {
        self.files.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    fn remove(&self, path: &Path) {
        self.files.write().unwrap_or_else(PoisonError::into_inner).remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as sync_fs;

    fn write(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        sync_fs::create_dir_all(path.parent().unwrap()).unwrap();
        sync_fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn test_new_requires_absolute_existing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(DirectoryWatcher::new(temp_dir.path()).is_ok());
        assert!(DirectoryWatcher::new("relative/path").is_err());
        assert!(DirectoryWatcher::new(temp_dir.path().join("missing")).is_err());
        let file = write(temp_dir.path(), "file.mp3");
        let err = DirectoryWatcher::new(&file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_refresh_discovers_media_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let a = write(temp_dir.path(), "Band/Record/01.mp3");
        let b = write(temp_dir.path(), "Other/02.M4A");
        write(temp_dir.path(), "Band/Record/cover.jpg");
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();
        assert!(!watcher.is_dirty());

        let refresh = watcher.refresh().await;
        assert_eq!(refresh, Refresh { added: 2, removed: 0, changed: 0 });
        assert!(watcher.is_dirty());
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(watcher.paths(), expected);
    }

    #[tokio::test]
    async fn test_refresh_without_changes_leaves_signal_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "song.mp3");
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();
        watcher.refresh().await;
        watcher.set_dirty(false);
        assert!(watcher.refresh().await.is_empty());
        assert!(!watcher.is_dirty());
    }

    #[tokio::test]
    async fn test_refresh_notices_removal_and_change() {
        let temp_dir = tempfile::tempdir().unwrap();
        let gone = write(temp_dir.path(), "gone.mp3");
        let kept = write(temp_dir.path(), "kept.mp3");
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();
        watcher.refresh().await;
        watcher.set_dirty(false);

        sync_fs::remove_file(&gone).unwrap();
        sync_fs::write(&kept, b"longer data than before").unwrap();
        let refresh = watcher.refresh().await;
        assert_eq!(refresh, Refresh { added: 0, removed: 1, changed: 1 });
        assert!(watcher.is_dirty());
        assert_eq!(watcher.paths(), vec![kept]);
    }

    #[tokio::test]
    async fn test_track_and_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let song = write(temp_dir.path(), "song.mp3");
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();
        watcher.track(&song).await.unwrap();
        assert!(watcher.is_dirty());
        assert_eq!(watcher.paths(), vec![song.clone()]);
        assert_eq!(watcher.clip(&song).as_deref(), Some("song.mp3"));
        watcher.remove(&song);
        assert!(watcher.paths().is_empty());
    }

    #[tokio::test]
    async fn test_track_rejects_paths_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let song = write(elsewhere.path(), "song.mp3");
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();
        let err = watcher.track(&song).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutsideRoot(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cyclic_links_are_walked_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let song = write(temp_dir.path(), "song.mp3");
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("again")).unwrap();
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();

        let refresh = watcher.refresh().await;
        assert_eq!(refresh, Refresh { added: 1, removed: 0, changed: 0 });
        assert_eq!(watcher.paths(), vec![song]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_linked_directories_are_followed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        write(elsewhere.path(), "Band/01.mp3");
        std::os::unix::fs::symlink(elsewhere.path().join("Band"), temp_dir.path().join("Band")).unwrap();
        let watcher = DirectoryWatcher::new(temp_dir.path()).unwrap();

        watcher.refresh().await;
        assert_eq!(watcher.paths(), vec![temp_dir.path().join("Band/01.mp3")]);
    }

    #[tokio::test]
    async fn test_custom_extensions() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "song.mp3");
        let flac = write(temp_dir.path(), "song.flac");
        let watcher = DirectoryWatcher::with_extensions(temp_dir.path(), [".FLAC"]).unwrap();
        watcher.refresh().await;
        assert_eq!(watcher.paths(), vec![flac]);
    }
}
