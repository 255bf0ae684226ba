mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use pl_core::events::{Event, EventBus, EventPayload};
use plexlink::config::Config;
use plexlink::metadata::providers::{DoubanProvider, TmdbProvider};
use plexlink::metadata::{MetadataCache, MetadataResolver};
use plexlink::pipeline::Pipeline;
use plexlink::redo::RedoLog;
use plexlink::watch::Monitor;

use cli::{Cli, Commands, RedoAction};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise derive a default from --verbose.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "plexlink=debug,pl_core=debug,pl_classify=debug".to_string()
        } else {
            "plexlink=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Start => start(cli.config.as_deref()).await,
        Commands::Run {
            input,
            dest,
            missing_only,
        } => run_once(cli.config.as_deref(), &input, dest, missing_only).await,
        Commands::Classify { filename } => classify(&filename),
        Commands::Redo { action } => redo(cli.config.as_deref(), action).await,
        Commands::Validate { config } => {
            let path = config.or(cli.config);
            validate(path.as_deref())
        }
    }
}

/// Build the metadata chain: TMDB primary, Douban fallback, each with its
/// own cache directory.
fn build_pipeline(config: &Config) -> Pipeline {
    let timeout = Duration::from_secs(config.metadata.request_timeout_secs);
    let mut resolver = MetadataResolver::new(config.metadata.fallback_enabled);

    resolver.register(Arc::new(TmdbProvider::new(
        config.metadata.tmdb_api_key.clone().unwrap_or_default(),
        config.metadata.language.clone(),
        MetadataCache::new(config.metadata.cache_dir.join("tmdb")),
        timeout,
    )));
    resolver.register(Arc::new(DoubanProvider::new(
        config.metadata.douban_cookies.clone(),
        MetadataCache::new(config.metadata.cache_dir.join("douban")),
        timeout,
    )));

    Pipeline::new(resolver)
}

async fn start(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let events = Arc::new(EventBus::default());
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
        events.broadcast(EventPayload::System {
            level: "warning".into(),
            message: warning,
        });
    }
    if !config.watch.enabled {
        tracing::warn!("watch.enabled is false in config; starting anyway (explicit start)");
    }

    let redo = Arc::new(RedoLog::open(&config.redo.dir, config.redo.max_entries)?);
    let pipeline = Arc::new(build_pipeline(&config));

    // Independent notification task consuming pipeline results and status
    // events, with explicit shutdown.
    let consumer_cancel = CancellationToken::new();
    let consumer = tokio::spawn(consume_events(events.subscribe(), consumer_cancel.clone()));

    let monitor = Monitor::start(&config, pipeline, redo, events.clone())?;
    tracing::info!("Monitoring started; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    monitor.stop().await;
    consumer_cancel.cancel();
    let _ = consumer.await;

    Ok(())
}

async fn consume_events(mut rx: broadcast::Receiver<Event>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event consumer lagged, skipped {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn log_event(event: &Event) {
    match &event.payload {
        EventPayload::FileProcessed { result } => {
            if result.success {
                tracing::info!(
                    source = %result.source.display(),
                    dest = %result.destination.as_deref().unwrap_or(Path::new("?")).display(),
                    "{}", result.message
                );
            } else if let Some(redo) = &result.redo {
                tracing::warn!(
                    source = %result.source.display(),
                    "{} (retry with: {redo})", result.message
                );
            } else {
                tracing::warn!(source = %result.source.display(), "{}", result.message);
            }
        }
        EventPayload::RedoRecorded { id } => {
            tracing::info!("Redo entry {id} recorded");
        }
        EventPayload::RedoReplayed { id, success } => {
            tracing::info!("Redo entry {id} replayed (success: {success})");
        }
        EventPayload::MonitorStarted { directories } => {
            tracing::info!("Monitoring {} directories", directories.len());
        }
        EventPayload::MonitorStopped => tracing::info!("Monitor stopped"),
        EventPayload::WatcherRestarted => tracing::warn!("Watch backend restarted"),
        EventPayload::FileSettled { path } => {
            tracing::debug!("Settled: {}", path.display());
        }
        EventPayload::System { level, message } => {
            tracing::info!("[{level}] {message}");
        }
    }
}

async fn run_once(
    config_path: Option<&Path>,
    input: &Path,
    dest: Option<std::path::PathBuf>,
    missing_only: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let pipeline = build_pipeline(&config);
    let redo = RedoLog::open(&config.redo.dir, config.redo.max_entries)?;

    let dest = dest
        .or_else(|| config.default_dest_dir.clone())
        .context("no destination: pass DEST or set default_dest_dir in config")?;

    if !input.exists() {
        anyhow::bail!("input does not exist: {}", input.display());
    }

    let results = if input.is_dir() {
        if missing_only {
            pipeline.process_missing(input, &dest).await
        } else {
            pipeline.process_directory(input, &dest).await
        }
    } else {
        vec![pipeline.process_file(input, &dest, None).await]
    };

    let mut failures = 0usize;
    for result in &results {
        if result.success {
            println!(
                "ok   {} -> {}",
                result.source.display(),
                result
                    .destination
                    .as_deref()
                    .unwrap_or(Path::new("?"))
                    .display()
            );
        } else {
            failures += 1;
            println!("fail {} ({})", result.source.display(), result.message);
            if let Some(entry) = redo.record(result) {
                println!("     recorded redo entry {}", entry.id);
            }
        }
    }

    println!("\n{} processed, {} failed", results.len(), failures);
    Ok(())
}

fn classify(filename: &str) -> Result<()> {
    let descriptor = pl_classify::classify(filename);
    println!("{}", serde_json::to_string_pretty(&descriptor)?);

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    println!("formatted: {}", pl_classify::format_name(&descriptor, extension));
    Ok(())
}

async fn redo(config_path: Option<&Path>, action: RedoAction) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let pipeline = build_pipeline(&config);
    let log = RedoLog::open(&config.redo.dir, config.redo.max_entries)?;

    match action {
        RedoAction::List => {
            let pending = log.list_pending();
            if pending.is_empty() {
                println!("No pending redo entries");
                return Ok(());
            }
            for entry in pending {
                println!(
                    "{}  {}  {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.command
                );
            }
        }
        RedoAction::Run { id } => {
            let result = log.replay(id, &pipeline).await?;
            print_replay(id, &result);
        }
        RedoAction::RunAll => {
            let pending = log.list_pending();
            if pending.is_empty() {
                println!("No pending redo entries");
                return Ok(());
            }
            for entry in pending {
                match log.replay(entry.id, &pipeline).await {
                    Ok(result) => print_replay(entry.id, &result),
                    Err(e) => println!("{}: error: {e}", entry.id),
                }
            }
        }
    }
    Ok(())
}

fn print_replay(id: i64, result: &pl_core::ProcessingResult) {
    if result.success {
        println!(
            "{id}: ok -> {}",
            result
                .destination
                .as_deref()
                .unwrap_or(Path::new("?"))
                .display()
        );
    } else {
        println!("{id}: failed ({})", result.message);
    }
}

fn validate(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            println!("Validating config: {}", path.display());
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config = Config::from_json(&contents)?;
            println!("Configuration parses");
            println!("  Directories: {}", config.directories.len());
            for dir in &config.directories {
                println!(
                    "    {} : {} -> {}",
                    dir.name,
                    dir.source_dir.display(),
                    dir.dest_dir.display()
                );
            }
            println!("  Watch enabled: {}", config.watch.enabled);
            println!("  Fallback enabled: {}", config.metadata.fallback_enabled);
            println!("  Redo cap: {}", config.redo.max_entries);
            for warning in config.validate() {
                println!("  warning: {warning}");
            }
        }
        None => {
            println!("No config file specified; defaults are:");
            let config = Config::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
