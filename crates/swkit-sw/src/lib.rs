//! # swkit Service Worker
//!
//! Offline asset cache for the app launcher.
//!
//! ## Features
//!
//! - **Install**: pre-cache a fixed manifest into a versioned cache generation
//! - **Fetch**: network-first navigations with app-shell fallback, cache-first
//!   subresources with opportunistic caching of cross-origin responses
//! - **Activate**: evict every cache generation except the current one
//! - **Notifications**: icon injection and click-to-focus
//!
//! ## Architecture
//!
//! ```text
//! OfflineCacheWorker
//!     ├── WorkerConfig (cache name, origin, manifest)
//!     ├── CacheStorage (caches)
//!     │       └── Cache
//!     │               └── Request → Response
//!     ├── Fetcher (network)
//!     ├── Clients (windows)
//!     └── NotificationCenter
//! ```

use swkit_common::SwKitError;
use swkit_net::NetError;
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod manifest;
pub mod notification;
pub mod strategy;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheError, CacheKey, CacheStorage, MemoryCacheStorage};
pub use clients::{Client, ClientQuery, ClientRegistry, ClientType, Clients};
pub use config::{ConfigError, ResolvedConfig, WorkerConfig};
pub use manifest::Manifest;
pub use notification::{
    Notification, NotificationCenter, NotificationClickEvent, NotificationOptions,
    NotificationTray,
};
pub use strategy::{CacheDecision, SkipReason, Strategy, StrategyRule};
pub use worker::{
    ClickOutcome, FetchOutcome, InstallFailure, InstallReport, OfflineCacheWorker,
    ResponseSource, ServiceWorkerState, WorkerEvent,
};

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl From<ServiceWorkerError> for SwKitError {
    fn from(err: ServiceWorkerError) -> Self {
        match err {
            ServiceWorkerError::Network(e) => e.into(),
            ServiceWorkerError::Cache(e) => SwKitError::cache_with_source("cache storage", e),
            ServiceWorkerError::Config(e) => SwKitError::config_with_source("worker config", e),
            ServiceWorkerError::State(msg) => SwKitError::lifecycle(msg),
            ServiceWorkerError::Client(msg) => SwKitError::InvalidArgument(msg),
        }
    }
}
