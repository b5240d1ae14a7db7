//! The incremental indexing pipeline.
//!
//! A run goes `Idle → Scanning → Finalizing → Idle`:
//!
//! 1. **Scanning**: every path in a snapshot of the watcher's set is examined
//!    one at a time. Files whose modification time matches the cache are
//!    skipped; everything else has its tag read and cached.
//! 2. **Finalizing**: if anything changed, the whole index is rebuilt from the
//!    cache (not just the files touched in this run), dirty records are
//!    cleared and records for paths the watcher no longer tracks are reaped.
//!
//! At most one run is active at a time. A run never aborts because of a
//! single file; it always ends in `Idle` with a [`RunCompleted`] event.
//!
//! [`RunCompleted`]: PipelineEvent::RunCompleted

mod finalize;
mod scan;

pub use self::scan::FileOutcome;
use crate::artifacts::{ArtifactPaths, remove_if_exists};
use crate::errlog::ErrorLog;
use crate::error::{ErrorKind, Result};
use crate::events::{PipelineEvent, PipelineState, RunSummary, TickOutcome};
use crate::index::IndexWriter;
use exn::ResultExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagdex_cache::{CacheStore, FileRecord};
use tagdex_tags::ReaderHandle;
use tagdex_watcher::WatcherHandle;
use tokio::sync::{Mutex, MutexGuard, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

const EVENT_CAPACITY: usize = 256;

/// Drives runs over the watcher's file set. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

struct Shared {
    watcher: WatcherHandle,
    reader: ReaderHandle,
    cache: CacheStore,
    writer: IndexWriter,
    errors: ErrorLog,
    busy: Mutex<()>,
    events: broadcast::Sender<PipelineEvent>,
    state: watch::Sender<PipelineState>,
}

/// Everything one run carries from start to finish.
struct Run {
    snapshot: Vec<PathBuf>,
    summary: RunSummary,
}
impl Run {
    fn new(snapshot: Vec<PathBuf>) -> Self {
        let summary = RunSummary { files: snapshot.len(), ..RunSummary::default() };
        Self { snapshot, summary }
    }
}

impl Pipeline {
    pub fn new(watcher: WatcherHandle, reader: ReaderHandle, cache: CacheStore, artifacts: ArtifactPaths) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(PipelineState::Idle);
        Ok(Self {
            shared: Arc::new(Shared {
                watcher,
                reader,
                cache,
                writer: IndexWriter::new(artifacts.index, artifacts.status)?,
                errors: ErrorLog::new(artifacts.error_log),
                busy: Mutex::new(()),
                events,
                state,
            }),
        })
    }

    pub fn state(&self) -> PipelineState {
        *self.shared.state.borrow()
    }

    /// Receive every event sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    /// Start a run if the watcher has unprocessed changes and no run is active.
    pub async fn tick(&self) -> TickOutcome {
        if !self.shared.watcher.is_dirty() {
            return TickOutcome::Clean;
        }
        let Ok(guard) = self.shared.busy.try_lock() else {
            return TickOutcome::Busy;
        };
        TickOutcome::Ran(self.shared.run(guard).await)
    }

    /// Run regardless of the watcher's signal, waiting for an active run to
    /// finish first.
    pub async fn run_once(&self) -> RunSummary {
        let guard = self.shared.busy.lock().await;
        self.shared.run(guard).await
    }

    /// Call [`tick`](Self::tick) every `period` on a background task.
    ///
    /// Ticks that fall due while a run is in progress are skipped rather than
    /// queued.
    pub fn start(&self, period: Duration) -> PipelineHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let TickOutcome::Ran(summary) = pipeline.tick().await {
                            tracing::debug!(?summary, "Scheduled run finished");
                        }
                    },
                    // Also fires if the handle was dropped.
                    _ = stop.changed() => break,
                }
            }
        });
        PipelineHandle { shutdown, task }
    }

    /// Delete the index, status marker, error log and every cache record, then
    /// raise the watcher's signal so the next tick reindexes from scratch.
    #[instrument(skip(self))]
    pub async fn wipe(&self) -> Result<()> {
        let _guard = self.shared.busy.lock().await;
        remove_if_exists(self.shared.writer.index_path()).await?;
        remove_if_exists(self.shared.writer.status_path()).await?;
        self.shared.errors.remove().await?;
        let cleared = self.shared.cache.clear().await.or_raise(|| ErrorKind::Cache)?;
        self.shared.cache.persist().await.or_raise(|| ErrorKind::Cache)?;
        self.shared.watcher.set_dirty(true);
        tracing::info!(cleared, "Wiped index state");
        Ok(())
    }

    /// Every cached record, ordered by path.
    pub async fn records(&self) -> Result<Vec<FileRecord>> {
        self.shared.cache.all().await.or_raise(|| ErrorKind::Cache)
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.shared.errors
    }
}

impl Shared {
    fn emit(&self, event: PipelineEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: PipelineState) {
        self.state.send_replace(state);
        self.emit(PipelineEvent::StatusChanged(state));
    }

    /// The guard is held for the whole run and released however it ends.
    #[instrument(skip_all, fields(root = %self.watcher.root().display()))]
    async fn run(&self, _guard: MutexGuard<'_, ()>) -> RunSummary {
        self.emit(PipelineEvent::RunStarted);
        self.set_state(PipelineState::Scanning);
        self.watcher.set_dirty(false);
        self.errors.reset().await;

        let mut run = Run::new(self.watcher.paths());
        tracing::info!(files = run.summary.files, "Run started");
        self.scan(&mut run).await;

        self.set_state(PipelineState::Finalizing);
        if let Err(err) = self.finalize(&mut run).await {
            tracing::error!(error = ?err, "Finalizing failed; the index may be stale");
            run.summary.errors = true;
        }
        self.set_state(PipelineState::Idle);

        let summary = run.summary;
        tracing::info!(
            read = summary.read,
            unchanged = summary.unchanged,
            missing = summary.missing,
            failed = summary.failed,
            rebuilt = summary.rebuilt,
            reaped = summary.reaped,
            "Run complete"
        );
        self.emit(PipelineEvent::RunCompleted(summary));
        summary
    }
}

/// Stops the background task started by [`Pipeline::start`].
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}
impl PipelineHandle {
    /// Stop ticking. A run in progress is allowed to finish first.
    pub async fn dispose(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "Pipeline task did not shut down cleanly");
        }
    }
}
