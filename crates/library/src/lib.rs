//! Incremental indexing of tagged media files.
//!
//! [`Pipeline`] ties the pieces together: it asks a watcher for the current
//! file set, reads tags for files that changed since the cache last saw them,
//! and rebuilds the index artifact and status marker whenever anything
//! changed. Per-file failures end up in the [`ErrorLog`], never in a `Result`.

mod artifacts;
mod errlog;
pub mod error;
mod events;
mod index;
mod pipeline;
mod reap;

pub use crate::artifacts::ArtifactPaths;
pub use crate::errlog::ErrorLog;
pub use crate::events::{PipelineEvent, PipelineState, RunSummary, TickOutcome};
pub use crate::index::{IndexDocument, IndexEntry, IndexWriter, StatusMarker};
pub use crate::pipeline::{FileOutcome, Pipeline, PipelineHandle};
pub use crate::reap::{find_orphans, reap_orphans};
