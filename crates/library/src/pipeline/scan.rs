use super::{Run, Shared};
use crate::errlog::{READ_FAILURE, TAG_FAILURE};
use crate::error::{ErrorKind, Result};
use crate::events::{PipelineEvent, RunSummary, percent};
use exn::{OptionExt, ResultExt};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::time::SystemTime;
use tagdex_cache::FileRecord;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs;

/// What happened to one file during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Modification time matches the cache; the tag wasn't read.
    Unchanged,
    /// Tag read and cached. `label` is "Title - Artist" for progress reports.
    Indexed { label: String },
    /// Gone from disk; the watcher was told to stop tracking it.
    MissingFile,
    /// The tag was malformed, missing, or of a family that isn't indexed.
    TagFailure,
    /// The file couldn't be read, or anything else went wrong examining it.
    ReadFailure,
}

/// Modification times are compared as strings; equal strings mean unchanged.
fn format_mtime(modified: SystemTime) -> Option<String> {
    OffsetDateTime::from(modified).format(&Rfc3339).ok()
}

impl Shared {
    /// Process every path in the snapshot, strictly one after the other.
    pub(super) async fn scan(&self, run: &mut Run) {
        let Run { snapshot, summary } = run;
        let total = snapshot.len();
        for (done, path) in snapshot.iter().enumerate() {
            let outcome = match self.scan_file(path).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = ?err, "Could not process file; treating it as unreadable");
                    // No mtime, so the file is retried on the next run.
                    if let Err(err) = self.cache.upsert(&FileRecord::failed(path, None)).await {
                        tracing::warn!(path = %path.display(), error = ?err, "Could not record failure in cache");
                    }
                    FileOutcome::ReadFailure
                },
            };
            tracing::trace!(path = %path.display(), ?outcome, "File processed");
            match outcome {
                FileOutcome::Unchanged => summary.unchanged += 1,
                FileOutcome::MissingFile => summary.missing += 1,
                FileOutcome::Indexed { label } => {
                    summary.read += 1;
                    self.emit(PipelineEvent::Progress { percent: percent(done + 1, total), label });
                },
                FileOutcome::TagFailure => self.record_failure(path, TAG_FAILURE, summary).await,
                FileOutcome::ReadFailure => self.record_failure(path, READ_FAILURE, summary).await,
            }
        }
    }

    async fn record_failure(&self, path: &Path, description: &str, summary: &mut RunSummary) {
        summary.failed += 1;
        summary.errors = true;
        let shown = self.watcher.clip(path).unwrap_or_else(|| path.display().to_string());
        self.errors.append(&shown, description).await;
    }

    async fn scan_file(&self, path: &Path) -> Result<FileOutcome> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                // The cache record stays until the finalizer reaps it.
                self.watcher.remove(path);
                return Ok(FileOutcome::MissingFile);
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::File(path.to_path_buf())),
        };
        let mtime = metadata.modified().ok().and_then(format_mtime);
        let cached = self.cache.get(path).await.or_raise(|| ErrorKind::Cache)?;
        if let Some(cached) = cached
            && cached.mtime.is_some()
            && cached.mtime == mtime
        {
            return Ok(FileOutcome::Unchanged);
        }

        let clipped = self.watcher.clip(path).ok_or_raise(|| ErrorKind::File(path.to_path_buf()))?;
        match self.reader.read_indexable(path).await {
            Ok(tag) => {
                let label = tag.label();
                let record = FileRecord::indexed(path, mtime, tag.into_data(clipped));
                self.cache.upsert(&record).await.or_raise(|| ErrorKind::Cache)?;
                Ok(FileOutcome::Indexed { label })
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = ?err, "Tag read failed");
                self.cache.upsert(&FileRecord::failed(path, mtime)).await.or_raise(|| ErrorKind::Cache)?;
                Ok(if err.is_tag_failure() { FileOutcome::TagFailure } else { FileOutcome::ReadFailure })
            },
        }
    }
}
