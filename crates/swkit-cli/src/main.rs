//! swkit - drive the offline asset cache worker from the command line.
//!
//! Cache generations persist in a JSON snapshot between invocations.
//!
//! ## Usage
//!
//! ```bash
//! # Pre-cache the manifest into the current generation
//! swkit install
//!
//! # Install, then evict every other generation
//! swkit activate
//!
//! # Run a request through the fetch handler
//! swkit fetch https://cdn.tailwindcss.com
//! swkit fetch http://localhost:5173/settings --navigate
//!
//! # List cache generations
//! swkit caches
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use swkit_common::logging::{init_logging, LogConfig};
use swkit_net::{HttpFetcher, LoaderConfig};
use swkit_sw::{MemoryCacheStorage, OfflineCacheWorker, WorkerConfig};
use tracing::{debug, error};

mod commands;

#[derive(Parser)]
#[command(name = "swkit")]
#[command(about = "Offline asset cache worker")]
struct Cli {
    /// Worker configuration file (JSON). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache snapshot file
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-cache the manifest into the current cache generation
    Install,

    /// Install, then delete every other cache generation
    Activate,

    /// Run one request through the fetch handler
    Fetch {
        /// Request URL
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// List cache generations and their entries
    Caches,

    /// Show a notification and simulate a click on it
    Notify {
        /// Notification title
        title: String,
        /// Notification body
        #[arg(short, long)]
        body: Option<String>,
    },
}

fn default_store() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("swkit")
        .join("cache-storage.json")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig::from_verbosity(cli.verbose));

    let config = match &cli.config {
        Some(path) => WorkerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    let store = cli.store.clone().unwrap_or_else(default_store);
    debug!(store = %store.display(), "Using cache snapshot");

    let storage = Arc::new(
        MemoryCacheStorage::load(&store)
            .await
            .with_context(|| format!("failed to load cache snapshot {}", store.display()))?,
    );

    let resolved = config.resolve().context("invalid worker config")?;
    let fetcher = Arc::new(
        HttpFetcher::new(LoaderConfig {
            app_origin: Some(resolved.origin.clone()),
            ..Default::default()
        })
        .context("failed to build HTTP client")?,
    );

    let (worker, events) = OfflineCacheWorker::new(&config, storage.clone(), fetcher.clone())
        .context("failed to create worker")?;

    let result = match cli.command {
        Commands::Install => commands::install(&worker).await,
        Commands::Activate => commands::activate(&worker).await,
        Commands::Fetch {
            url,
            navigate,
            method,
        } => commands::fetch(&worker, fetcher.as_ref(), &url, navigate, &method).await,
        Commands::Caches => commands::caches(storage.as_ref()).await,
        Commands::Notify { title, body } => commands::notify(&worker, title, body).await,
    };

    // Dropping the worker closes the event channel once background cache
    // writes have finished.
    drop(worker);
    commands::drain_events(events).await;

    storage
        .save(&store)
        .await
        .with_context(|| format!("failed to save cache snapshot {}", store.display()))?;

    if let Err(err) = result {
        error!(category = err.category(), error = %err, "Command failed");
        return Err(err.into());
    }
    Ok(())
}
