//! What a [`Pipeline`](crate::Pipeline) tells its observers.

use derive_more::Display;

/// Where the pipeline is in its run cycle.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("scanning")]
    Scanning,
    #[display("finalizing")]
    Finalizing,
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Paths in the snapshot taken when the run started.
    pub files: usize,
    /// Tags read and cached.
    pub read: usize,
    /// Skipped because their modification time hadn't changed.
    pub unchanged: usize,
    /// Gone from disk by the time they were reached.
    pub missing: usize,
    /// Tag or read failures.
    pub failed: usize,
    /// Something went wrong that the user should look at the error log for.
    pub errors: bool,
    /// The index and status marker were written.
    pub rebuilt: bool,
    /// Cache records removed because their path is no longer tracked.
    pub reaped: usize,
}

/// Events broadcast by a [`Pipeline`](crate::Pipeline).
///
/// For each run: [`RunStarted`](Self::RunStarted), then state changes and
/// progress interleaved, then [`RunCompleted`](Self::RunCompleted) once the
/// pipeline is idle again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    RunStarted,
    /// A file was read. `percent` is how far through the snapshot the run is.
    Progress { percent: u8, label: String },
    StatusChanged(PipelineState),
    RunCompleted(RunSummary),
}

/// What a single [`Pipeline::tick`](crate::Pipeline::tick) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The watcher had nothing new.
    Clean,
    /// A run is already in progress; this tick was a no-op.
    Busy,
    Ran(RunSummary),
}

pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(done.min(total) * 100 / total).unwrap_or(100)
}
