//! SQLite pool behind the [`CacheStore`](crate::CacheStore).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATIONS: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// The pipeline is the only writer and handles one file at a time; the spare
// connections serve `list` style reads while a run is in progress.
const POOL_SIZE: u32 = 3;
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Migrated connection pool for the cache database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, POOL_SIZE).await
    }

    /// A private, empty database that lives as long as the pool.
    ///
    /// Public rather than `#[cfg(test)]` so dependants can build stores in
    /// their own tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to ":memory:" is its own database.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(size)
            .after_connect(|conn, meta| Box::pin(Self::tune(conn, meta)))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        // A file that isn't a database often only fails here.
        if let Err(err) = db.migrate().await {
            db.close().await;
            return Err(err);
        }
        Ok(db)
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // The store is persisted at fixed points of every run; FULL makes
            // each of those points survive power loss.
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT)
    }

    /// Settings that SqliteConnectOptions has no builder for, applied to
    /// every pooled connection.
    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query("PRAGMA wal_autocheckpoint = 800; PRAGMA cache_size = -4096; PRAGMA temp_store = MEMORY;")
            .execute(conn)
            .await?;
        Ok(())
    }

    #[instrument("migrating cache database", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATIONS.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Fold the write-ahead log into the main file and truncate it.
    ///
    /// Afterwards everything committed so far survives losing the WAL file.
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// SQLite's own structural check (`PRAGMA quick_check`).
    pub async fn is_intact(&self) -> Result<bool> {
        let (verdict,): (String,) =
            sqlx::query_as("PRAGMA quick_check").fetch_one(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(verdict == "ok")
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding connections and close the pool. The database
    /// can't be used afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_closes() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrating_twice_is_harmless() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let (tables,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE name = 'files'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(tables, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_checks_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("cache.sqlite")).await.unwrap();
        assert!(db.is_intact().await.unwrap());
        db.checkpoint().await.unwrap();
        db.checkpoint().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_connections_are_tuned() {
        let db = Database::connect_in_memory().await.unwrap();
        let (pages,): (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(pages, 800);
        let (store,): (i64,) = sqlx::query_as("PRAGMA temp_store").fetch_one(db.pool()).await.unwrap();
        // 2 = MEMORY
        assert_eq!(store, 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        std::fs::write(&path, vec![0xA5; 8192]).unwrap();
        assert!(Database::connect(&path).await.is_err());
    }
}
