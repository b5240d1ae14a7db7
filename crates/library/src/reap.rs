//! Removing cache records for paths the watcher no longer tracks.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tagdex_cache::{CacheStore, FileRecord};

/// Paths of every record that isn't in `current`.
pub fn find_orphans<'a>(records: impl IntoIterator<Item = &'a FileRecord>, current: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    records
        .into_iter()
        .filter(|record| !current.contains(&record.path))
        .map(|record| record.path.clone())
        .collect()
}

/// Remove the given records from the cache. Returns how many existed.
pub async fn reap_orphans(cache: &CacheStore, orphans: &[PathBuf]) -> Result<usize> {
    let mut reaped = 0;
    for path in orphans {
        if cache.remove(path).await.or_raise(|| ErrorKind::Cache)? {
            tracing::debug!(path = %path.display(), "Reaped orphaned cache record");
            reaped += 1;
        }
    }
    Ok(reaped)
}
