mod cache;
mod config;
mod event;
mod net;
mod worker;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheSet, CacheStore, MemoryStorage, SqliteStorage};
use crate::net::Request;
use crate::worker::OfflineWorker;

#[derive(Parser, Debug)]
#[command(name = "partycache")]
#[command(about = "Offline cache controller for the party planner web app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/partycache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Accept header to send with the request
  #[arg(short, long, default_value = "text/html")]
  accept: String,

  /// Run the install step only (pre-populate the offline document)
  #[arg(long)]
  install_only: bool,

  /// Keep snapshots in memory instead of the on-disk cache
  #[arg(long)]
  ephemeral: bool,

  /// URL to fetch through the controller
  url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let storage: Box<dyn CacheStore> = if args.ephemeral {
    Box::new(MemoryStorage::new())
  } else {
    match &config.cache.path {
      Some(path) => Box::new(SqliteStorage::open_at(path)?),
      None => Box::new(SqliteStorage::open()?),
    }
  };

  let worker = OfflineWorker::new(&config, CacheSet::new(storage))?;
  let handle = event::spawn_worker(worker);

  if args.install_only {
    handle.install().await?;
    info!("install complete, offline document cached");
    return Ok(());
  }

  let url = args
    .url
    .ok_or_else(|| eyre!("No URL given (pass a URL, or --install-only)"))?;
  let url = url
    .parse()
    .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))?;

  // A failed refresh only matters if no prior install left the offline
  // document behind; otherwise the cache can still serve.
  handle.ensure_installed().await?;

  let request = Request::get(url).with_accept(&args.accept);
  match handle.fetch(request).await? {
    Some(snapshot) => {
      info!(status = snapshot.status, "response served");
      std::io::stdout().write_all(&snapshot.body)?;
      Ok(())
    }
    None => Err(eyre!(
      "No response available: network failed and nothing is cached for this request"
    )),
  }
}
