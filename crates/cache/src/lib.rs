//! SQLite cache of per-file tag records.
//!
//! The cache is what lets repeated scans skip unchanged files: it remembers,
//! for every path the watcher has reported, the modification time it was last
//! read at, what tag was found (if any), whether that tag is complete enough
//! to index, and whether the record has changed since the index artifact was
//! last rebuilt.
//!
//! The cache is not the source of truth, the media files are. If the database
//! is deleted or corrupted, it is rebuilt by re-reading every file.

mod db;
pub mod error;
mod models;
mod store;

pub use crate::db::Database;
pub use crate::models::FileRecord;
pub use crate::store::CacheStore;
