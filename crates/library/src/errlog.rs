//! The user-facing log of per-file failures.
//!
//! One line per failure, `<path> : <description>`, truncated at the start of
//! every run. Writes are best-effort: a failure to write the log is reported
//! through `tracing` and otherwise ignored.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const TAG_FAILURE: &str = "tag read fail";
pub const READ_FAILURE: &str = "could not be read, is it properly tagged";
pub const INVALID_TAG: &str = "isn't properly tagged";

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}
impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the log, creating it if needed.
    pub async fn reset(&self) {
        if let Err(err) = self.try_reset().await {
            tracing::warn!(path = %self.path.display(), error = %err, "Could not reset error log");
        }
    }

    async fn try_reset(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, b"").await
    }

    /// Append `<path> : <description>`.
    pub async fn append(&self, path: &str, description: &str) {
        let line = format!("{path} : {description}\n");
        if let Err(err) = self.try_append(&line).await {
            tracing::warn!(path = %self.path.display(), error = %err, line = line.trim_end(), "Could not write to error log");
        }
    }

    async fn try_append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Everything logged since the last reset. A log that doesn't exist is empty.
    pub async fn contents(&self) -> Result<String> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err).or_raise(|| ErrorKind::Artifact(self.path.clone())),
        }
    }

    pub async fn remove(&self) -> Result<()> {
        crate::artifacts::remove_if_exists(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("errors.log"));
        assert_eq!(log.contents().await.unwrap(), "");
        log.append("Band/a.mp3", TAG_FAILURE).await;
        log.append("Band/b.mp3", READ_FAILURE).await;
        assert_eq!(
            log.contents().await.unwrap(),
            "Band/a.mp3 : tag read fail\nBand/b.mp3 : could not be read, is it properly tagged\n"
        );
        log.reset().await;
        assert_eq!(log.contents().await.unwrap(), "");
        assert!(log.path().exists());
        log.remove().await.unwrap();
        assert!(!log.path().exists());
    }

    #[tokio::test]
    async fn test_unwritable_log_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes every write fail.
        let log = ErrorLog::new(dir.path());
        log.reset().await;
        log.append("a.mp3", TAG_FAILURE).await;
    }
}
