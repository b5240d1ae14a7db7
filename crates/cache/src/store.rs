//! Persistent mapping from file path to [`FileRecord`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FileRow};
use exn::{OptionExt, ResultExt};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Persistent, self-healing store of [`FileRecord`]s.
///
/// Every mutation is committed immediately; [`persist`](Self::persist) folds
/// the write-ahead log back into the database file so that the store is
/// durable at well-defined points of a run.
///
/// If the persisted store can't be opened or read back into records,
/// [`load`](Self::load) throws it away and starts empty. Losing the cache only
/// costs a full re-read of every file; the index artifact is untouched.
#[derive(Debug, Clone)]
pub struct CacheStore {
    db: Database,
    location: Option<PathBuf>,
}
impl From<&Database> for CacheStore {
    fn from(db: &Database) -> Self {
        Self { db: db.clone(), location: None }
    }
}
impl CacheStore {
    /// Open the store persisted at `path`, creating it if it doesn't exist.
    ///
    /// A store that can't be used (not a database, failed integrity check,
    /// rows that don't decode) is deleted and replaced by an empty one.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::open(path).await {
            Ok(store) => Ok(store),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = ?err, "Cache is unusable; discarding it and starting empty");
                Self::discard(path).await?;
                Self::open(path).await
            },
        }
    }

    /// An empty, non-persistent store (useful for testing).
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::from(&Database::connect_in_memory().await?))
    }

    async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let db = Database::connect(path).await?;
        let store = Self { db, location: Some(path.to_path_buf()) };
        if let Err(err) = store.verify().await {
            store.close().await;
            return Err(err);
        }
        Ok(store)
    }

    /// Reads everything back once, so that corruption is found at startup
    /// rather than halfway through a run.
    async fn verify(&self) -> Result<()> {
        let path = self.location.clone().unwrap_or_default();
        if !self.db.is_intact().await.or_raise(|| ErrorKind::Corrupted(path.clone()))? {
            exn::bail!(ErrorKind::Corrupted(path));
        }
        self.all().await.or_raise(|| ErrorKind::Corrupted(path))?;
        Ok(())
    }

    /// Delete a persisted store along with its write-ahead log side files.
    pub async fn discard(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        for suffix in ["", "-wal", "-shm"] {
            let mut target = path.as_os_str().to_owned();
            target.push(suffix);
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {},
                Err(err) if err.kind() == IoErrorKind::NotFound => {},
                Err(err) => return Err(err).or_raise(|| ErrorKind::Discard(path.to_path_buf())),
            }
        }
        Ok(())
    }

    fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
        Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    fn decode(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    /// Where this store is persisted, if anywhere.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub async fn get(&self, path: impl AsRef<Path>) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_by_path.sql"))
            .bind(Self::sqlx_hates_paths(path)?)
            .fetch_optional(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Insert the record, replacing any existing record for the same path.
    pub async fn upsert(&self, record: &FileRecord) -> Result<()> {
        let row = FileRow::try_from(record)?;
        sqlx::query(include_str!("../queries/upsert_file.sql"))
            .bind(row.path)
            .bind(row.mtime)
            .bind(row.tagged)
            .bind(row.name)
            .bind(row.album)
            .bind(row.track)
            .bind(row.artist)
            .bind(row.clipped_path)
            .bind(row.is_valid)
            .bind(row.dirty)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Returns `true` if a record was removed.
    pub async fn remove(&self, path: impl AsRef<Path>) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(Self::sqlx_hates_paths(path)?)
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// All records, ordered by path.
    pub async fn all(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
            .fetch_all(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::decode(rows)
    }

    /// Records changed since the last rebuild, ordered by path.
    pub async fn dirty(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_dirty_files.sql"))
            .fetch_all(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::decode(rows)
    }

    /// Mark every dirty record as folded into the index. Returns how many were.
    pub async fn clear_dirty(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE files SET dirty = 0 WHERE dirty = 1")
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Remove every record.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files")
            .execute(self.db.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Make everything written so far durable. Safe to call any number of times.
    pub async fn persist(&self) -> Result<()> {
        self.db.checkpoint().await
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
