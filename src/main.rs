//! tagdex: keeps an index of the tagged media files under a directory.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tagdex_cache::CacheStore;
use tagdex_config::Config;
use tagdex_library::{ArtifactPaths, Pipeline, PipelineEvent, RunSummary};
use tagdex_tags::LoftyReader;
use tagdex_watcher::DirectoryWatcher;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "tagdex", version, about = "Incrementally indexes tagged media files", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory to index, overriding the configuration
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the index up to date until interrupted
    Watch,
    /// Scan once and rebuild the index if anything changed
    Once,
    /// Print every cached record
    List,
    /// Delete the index, status marker, error log and cache
    Wipe,
}

/// Everything a command needs, built from the configuration.
struct App {
    config: Config,
    cache: CacheStore,
    watcher: Arc<DirectoryWatcher>,
    pipeline: Pipeline,
}
impl App {
    async fn open(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref(), cli.root.as_deref()).or_raise(|| ErrorKind::Config)?;
        let cache_path = config.cache_path().or_raise(|| ErrorKind::Config)?;
        let cache = CacheStore::load(&cache_path).await.or_raise(|| ErrorKind::Cache)?;
        let watcher = Arc::new(
            DirectoryWatcher::with_extensions(&config.watch_root, config.extensions.clone())
                .or_raise(|| ErrorKind::Watcher)?,
        );
        let artifacts = ArtifactPaths {
            index: config.index_path(),
            status: config.status_path(),
            error_log: config.error_log_path(),
        };
        let pipeline = Pipeline::new(watcher.clone(), Arc::new(LoftyReader::new()), cache.clone(), artifacts)
            .or_raise(|| ErrorKind::Pipeline)?;
        tracing::debug!(root = %config.watch_root.display(), cache = %cache_path.display(), "Opened");
        Ok(Self { config, cache, watcher, pipeline })
    }

    async fn close(self) {
        if let Err(err) = self.cache.persist().await {
            tracing::warn!(error = ?err, "Could not persist cache on shutdown");
        }
        self.cache.close().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = App::open(&cli).await?;
    let result = match cli.command {
        Command::Watch => watch(&app).await,
        Command::Once => once(&app).await,
        Command::List => list(&app).await,
        Command::Wipe => app.pipeline.wipe().await.or_raise(|| ErrorKind::Pipeline),
    };
    app.close().await;
    result
}

async fn watch(app: &App) -> Result<()> {
    let mut events = app.pipeline.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PipelineEvent::RunStarted => tracing::info!("Scan started"),
                PipelineEvent::Progress { percent, label } => tracing::info!(percent, "{label}"),
                PipelineEvent::StatusChanged(state) => tracing::debug!(%state, "Pipeline state changed"),
                PipelineEvent::RunCompleted(summary) => report(&summary),
            }
        }
    });

    app.watcher.refresh().await;
    let handle = app.pipeline.start(app.config.tick_interval());
    let mut rescan = tokio::time::interval(app.config.rescan_interval());
    rescan.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately and the root was just walked.
    rescan.tick().await;
    tracing::info!(root = %app.config.watch_root.display(), "Watching; press Ctrl-C to stop");
    let signal = loop {
        tokio::select! {
            _ = rescan.tick() => {
                app.watcher.refresh().await;
            },
            signal = tokio::signal::ctrl_c() => break signal,
        }
    };
    tracing::info!("Shutting down");
    handle.dispose().await;
    reporter.abort();
    signal.or_raise(|| ErrorKind::Signal)
}

async fn once(app: &App) -> Result<()> {
    app.watcher.refresh().await;
    let summary = app.pipeline.run_once().await;
    println!(
        "{} files: {} read, {} unchanged, {} missing, {} failed{}",
        summary.files,
        summary.read,
        summary.unchanged,
        summary.missing,
        summary.failed,
        if summary.rebuilt { "; index rebuilt" } else { "" },
    );
    if summary.errors {
        println!("see {} for details", app.pipeline.error_log().path().display());
    }
    Ok(())
}

async fn list(app: &App) -> Result<()> {
    let records = app.pipeline.records().await.or_raise(|| ErrorKind::Pipeline)?;
    for record in &records {
        let status = match (&record.tag_data, record.is_valid) {
            (None, _) => "unreadable",
            (Some(_), false) => "incomplete",
            (Some(_), true) => "ok",
        };
        let tags = record
            .tag_data
            .as_ref()
            .map(|tag| {
                format!(
                    "{} - {} ({})",
                    tag.artist.as_deref().unwrap_or("?"),
                    tag.name.as_deref().unwrap_or("?"),
                    tag.album.as_deref().unwrap_or("?"),
                )
            })
            .unwrap_or_default();
        println!("{status:<10} {}  {tags}", record.path.display());
    }
    println!("{} records", records.len());
    Ok(())
}

fn report(summary: &RunSummary) {
    tracing::info!(
        files = summary.files,
        read = summary.read,
        failed = summary.failed,
        rebuilt = summary.rebuilt,
        reaped = summary.reaped,
        errors = summary.errors,
        "Scan finished"
    );
}
