use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use wpcache::cache::{
  CacheSyncEngine, ContentStore, PurgeOutcome, Reconciliation, SqliteStore, SyncOutcome,
};
use wpcache::config::{self, Config};
use wpcache::registry::ContentTypeRegistry;
use wpcache::scheduler::SyncScheduler;
use wpcache::wp::{HttpApiClient, RemoteId};

type Engine = CacheSyncEngine<HttpApiClient, SqliteStore>;

#[derive(Parser, Debug)]
#[command(name = "wpcache")]
#[command(about = "Keeps a local cache of WordPress JSON API content in sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wpcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch one item and update its cached copy
  Sync {
    content_type: String,
    id: String,
    /// Fetch the draft preview instead of the published item
    #[arg(long)]
    preview: bool,
  },
  /// Fetch the full listing and drop cached items no longer listed
  SyncAll {
    /// Content type to sync (default: every configured type)
    content_type: Option<String>,
  },
  /// Remove one item from the cache
  Purge { content_type: String, id: String },
  /// Print the cached items of a content type
  List { content_type: String },
  /// Run a full sync of every content type periodically until interrupted
  Run {
    /// Seconds between full syncs (default: sync.interval_secs)
    #[arg(long)]
    interval: Option<u64>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = wpcache::logging::init(&config::data_dir()?.join("logs"))?;

  let engine = build_engine(&config)?;

  match args.command {
    Command::Sync {
      content_type,
      id,
      preview,
    } => {
      let outcome = engine
        .sync_one(&content_type, &Value::String(id.clone()), preview)
        .await?;
      match outcome {
        SyncOutcome::Created => println!("{} {}: created", content_type, id),
        SyncOutcome::Updated => println!("{} {}: updated", content_type, id),
        SyncOutcome::RemoteAbsent { code } => {
          println!("{} {}: not found remotely ({})", content_type, id, code)
        }
        SyncOutcome::Ignored => println!("{} {}: invalid id, ignored", content_type, id),
      }
    }
    Command::SyncAll { content_type } => {
      let names: Vec<String> = match content_type {
        Some(name) => vec![name],
        None => engine.registry().iter().map(|t| t.name.clone()).collect(),
      };
      for name in names {
        let report = engine.sync_all(&name).await?;
        let deleted = match &report.reconciliation {
          Reconciliation::Applied { deleted } => deleted.len().to_string(),
          Reconciliation::Skipped => "skipped".to_string(),
        };
        println!(
          "{}: {} created, {} updated, {} deleted ({} pages)",
          name, report.created, report.updated, deleted, report.pages
        );
      }
    }
    Command::Purge { content_type, id } => {
      let remote_id = RemoteId::parse(&id).ok_or_else(|| eyre!("Invalid id '{}'", id))?;
      match engine.purge(&content_type, &remote_id).await? {
        PurgeOutcome::Purged => println!("{} {}: purged", content_type, id),
        PurgeOutcome::Missing => println!("{} {}: not cached", content_type, id),
      }
    }
    Command::List { content_type } => {
      if engine.registry().get(&content_type).is_none() {
        return Err(eyre!("Unknown content type: {}", content_type));
      }
      for record in engine.store().list(&content_type)? {
        println!(
          "{}\t{}\t{}",
          record.remote_id,
          record.fields.status.as_deref().unwrap_or("-"),
          record.fields.title.as_deref().unwrap_or("")
        );
      }
    }
    Command::Run { interval } => {
      let interval = Duration::from_secs(interval.unwrap_or(config.sync.interval_secs).max(1));
      run_periodic(engine, interval).await;
    }
  }

  Ok(())
}

fn build_engine(config: &Config) -> Result<Engine> {
  let registry = ContentTypeRegistry::from_config(&config.content_types)?;
  let store = SqliteStore::open(&config.database_path()?)?;
  let client = HttpApiClient::new(&config.remote)?;

  Ok(
    CacheSyncEngine::new(client, store, registry)
      .with_invalid_codes(config.remote.invalid_response_codes.clone())
      .with_max_pages(config.sync.max_pages),
  )
}

/// Enqueue a full sync of every registered type on each tick until Ctrl-C.
///
/// A type whose previous full sync has not started yet is skipped for that tick.
async fn run_periodic(engine: Engine, interval: Duration) {
  let engine = Arc::new(engine);
  let scheduler = SyncScheduler::start(Arc::clone(&engine));
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  info!(interval_secs = interval.as_secs(), "periodic sync started");

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        for content_type in engine.registry().iter() {
          scheduler.enqueue_sync_all(content_type.name.clone());
        }
      }
      _ = tokio::signal::ctrl_c() => {
        info!("interrupted, waiting for running syncs");
        break;
      }
    }
  }

  scheduler.shutdown().await;
}
