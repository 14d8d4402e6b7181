//! fsindex - keep a content index of directory trees up to date
//!
//! Entry point for the fsindex runner.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fsindex::observability::init_tracing;
use fsindex::paths::absolutize;
use fsindex::indexer::RateLimiter;
use fsindex::{
    Config, FileReindexer, IndexCoordinator, MemoryStore, PathStore, Result, WatchRepository,
};
use tokio_util::sync::CancellationToken;

/// fsindex - watch directories and index their files by content
#[derive(Parser, Debug)]
#[command(name = "fsindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directories to watch and index
    #[arg(short, long, env = "FSINDEX_WATCH_DIRS", value_delimiter = ',', required = true)]
    watch: Vec<PathBuf>,

    /// Number of indexing worker threads
    #[arg(long, env = "FSINDEX_WORKERS")]
    workers: Option<usize>,

    /// Capacity of the indexing work queue
    #[arg(long, env = "FSINDEX_QUEUE_LEN")]
    queue_len: Option<usize>,

    /// Quiet period in milliseconds before a written file is indexed
    #[arg(long, env = "FSINDEX_WRITE_TIMEOUT_MS")]
    write_timeout_ms: Option<u64>,

    /// Files stat'ed per second while indexing (0 = unlimited)
    #[arg(long, env = "FSINDEX_STAT_RATE")]
    stat_rate: Option<u32>,

    /// Files hashed per second while indexing (0 = unlimited)
    #[arg(long, env = "FSINDEX_HASH_RATE")]
    hash_rate: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FSINDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "FSINDEX_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let defaults = Config::default();
        let watch_dirs = self
            .watch
            .iter()
            .map(PathBuf::as_path)
            .map(absolutize)
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Config {
            watch_dirs,
            workers: self.workers.unwrap_or(defaults.workers),
            queue_len: self.queue_len.unwrap_or(defaults.queue_len),
            write_timeout: self
                .write_timeout_ms
                .map_or(defaults.write_timeout, Duration::from_millis),
            stat_rate: self.stat_rate.unwrap_or(defaults.stat_rate),
            hash_rate: self.hash_rate.unwrap_or(defaults.hash_rate),
            log_level: self.log_level,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("fsindex v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = cli.into_config()?;
    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let store = MemoryStore::new();
    let reindexer = FileReindexer::new(store.clone())
        .with_stat_limiter(RateLimiter::per_second(config.stat_rate))
        .with_hash_limiter(RateLimiter::per_second(config.hash_rate));
    let coordinator = Arc::new(IndexCoordinator::new(&config.coordinator_config(), reindexer)?);
    let shared_store: Arc<dyn PathStore> = Arc::new(store.clone());

    let shutdown = CancellationToken::new();
    let mut updates = coordinator.subscribe(shutdown.clone());
    let reporter = tokio::spawn(async move {
        while let Some(event) = updates.recv_event().await {
            tracing::info!(path = %event.path.display(), object = %event.id, "Object indexed");
        }
    });

    let watcher_config = config.watcher_config();
    let mut repositories = Vec::with_capacity(config.watch_dirs.len());
    for dir in &config.watch_dirs {
        let label = dir.display().to_string();
        let repository = WatchRepository::open(
            label,
            dir,
            Arc::clone(&coordinator),
            Arc::clone(&shared_store),
            &watcher_config,
        )?;
        repositories.push(repository);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!(paths = store.len(), "Shutdown requested");

    for repository in &repositories {
        let indexed = store.paths_under(repository.root()).len();
        tracing::info!(label = repository.label(), indexed, "Closing repository");
        repository.close().await;
    }
    shutdown.cancel();

    let closing = Arc::clone(&coordinator);
    tokio::task::spawn_blocking(move || closing.close())
        .await
        .map_err(|e| fsindex::Error::internal(format!("Shutdown task failed: {e}")))??;
    let _ = reporter.await;

    tracing::info!(stats = ?coordinator.stats(), "fsindex stopped");
    Ok(())
}
