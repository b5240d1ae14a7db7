use super::{Run, Shared};
use crate::errlog::INVALID_TAG;
use crate::error::{ErrorKind, Result};
use crate::events::RunSummary;
use crate::index::{IndexDocument, IndexEntry};
use crate::reap::{find_orphans, reap_orphans};
use exn::ResultExt;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tagdex_cache::FileRecord;

impl Shared {
    /// Persist, rebuild if anything changed, clear dirty records, reap and
    /// persist again.
    ///
    /// A rebuild happens when records are dirty or when cached paths are no
    /// longer tracked, so a deletion on its own still refreshes the index.
    pub(super) async fn finalize(&self, run: &mut Run) -> Result<()> {
        self.cache.persist().await.or_raise(|| ErrorKind::Cache)?;
        let dirty = self.cache.dirty().await.or_raise(|| ErrorKind::Cache)?;
        let records = self.cache.all().await.or_raise(|| ErrorKind::Cache)?;
        let current: BTreeSet<PathBuf> = self.watcher.paths().into_iter().collect();
        let orphans = find_orphans(&records, &current);
        if dirty.is_empty() && orphans.is_empty() {
            tracing::debug!("Nothing changed; leaving index as is");
            return Ok(());
        }
        tracing::debug!(dirty = dirty.len(), orphans = orphans.len(), "Rebuilding index");

        let document = self.build_document(&current, records, &mut run.summary).await;
        self.writer.write(&document).await?;
        run.summary.rebuilt = true;

        self.cache.clear_dirty().await.or_raise(|| ErrorKind::Cache)?;
        run.summary.reaped = reap_orphans(&self.cache, &orphans).await?;
        self.cache.persist().await.or_raise(|| ErrorKind::Cache)?;
        Ok(())
    }

    /// Every currently tracked path with a valid cached tag.
    async fn build_document(
        &self,
        current: &BTreeSet<PathBuf>,
        records: Vec<FileRecord>,
        summary: &mut RunSummary,
    ) -> IndexDocument {
        let mut records: HashMap<PathBuf, FileRecord> = records.into_iter().map(|r| (r.path.clone(), r)).collect();
        let mut tracks = Vec::with_capacity(current.len());
        for path in current {
            let Some(record) = records.remove(path) else {
                tracing::debug!(path = %path.display(), "Tracked path was never cached; skipping");
                continue;
            };
            let Some(tag) = record.tag_data else {
                tracing::debug!(path = %path.display(), "No readable tag; skipping");
                continue;
            };
            // Validated again: the cached flag may predate an interrupted run.
            match IndexEntry::from_tag(&tag) {
                Some(entry) => tracks.push(entry),
                None => {
                    self.errors.append(&tag.clipped_path, INVALID_TAG).await;
                    summary.errors = true;
                },
            }
        }
        IndexDocument::new(tracks)
    }
}
