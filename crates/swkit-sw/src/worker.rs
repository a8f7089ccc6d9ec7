//! The offline cache worker: install, fetch, activate and notification-click
//! handlers over a versioned cache storage.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use swkit_net::{CacheMode, Fetcher, Request, RequestMode, Response};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace, warn, Instrument};
use url::Url;

use crate::cache::CacheStorage;
use crate::clients::{Client, ClientQuery, ClientRegistry, Clients};
use crate::config::{ResolvedConfig, WorkerConfig};
use crate::notification::{
    Notification, NotificationCenter, NotificationClickEvent, NotificationOptions,
    NotificationTray,
};
use crate::strategy::{self, CacheDecision, Strategy};
use crate::ServiceWorkerError;

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Constructed, nothing run yet.
    #[default]
    Parsed,
    /// Install handler running.
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activate handler running.
    Activating,
    /// Active and serving fetches.
    Activated,
    /// Install failed.
    Redundant,
}

/// Events emitted by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// State changed.
    StateChange { state: ServiceWorkerState },
    /// A background cache write finished.
    EntryCached { cache: String, url: Url },
    /// A stale cache generation was deleted.
    GenerationDeleted { name: String },
}

/// A manifest URL that could not be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    pub url: Url,
    pub reason: String,
}

/// Result of an install run.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub cache_name: String,
    pub cached: Vec<Url>,
    pub failed: Vec<InstallFailure>,
}

impl InstallReport {
    /// Whether every manifest URL made it into the cache.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached app shell served for a failed navigation.
    ShellFallback,
}

/// Result of the fetch handler.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller performs the request itself.
    Passthrough,
    /// The worker produced a response.
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

/// Result of the notification-click handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An existing window was focused.
    Focused(Client),
    /// A new window was opened.
    Opened(Client),
}

/// Offline asset cache worker.
///
/// Stateless apart from its lifecycle state: the cache generation name and
/// manifest come from configuration, cached data lives in the storage.
pub struct OfflineCacheWorker {
    config: ResolvedConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn Clients>,
    notifications: Arc<dyn NotificationCenter>,
    state: RwLock<ServiceWorkerState>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl OfflineCacheWorker {
    /// Create a worker. Clients and notifications default to in-memory
    /// implementations.
    pub fn new(
        config: &WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>), ServiceWorkerError> {
        let config = config.resolve()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(
            cache = %config.cache_name,
            origin = %config.origin,
            manifest = config.manifest.len(),
            "Offline cache worker created"
        );

        Ok((
            Self {
                config,
                storage,
                fetcher,
                clients: Arc::new(ClientRegistry::new()),
                notifications: Arc::new(NotificationTray::new()),
                state: RwLock::new(ServiceWorkerState::Parsed),
                event_tx,
            },
            event_rx,
        ))
    }

    /// Use a different clients implementation.
    pub fn with_clients(mut self, clients: Arc<dyn Clients>) -> Self {
        self.clients = clients;
        self
    }

    /// Use a different notification surface.
    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationCenter>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub async fn state(&self) -> ServiceWorkerState {
        *self.state.read().await
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn set_state(&self, state: ServiceWorkerState) {
        *self.state.write().await = state;
        self.emit(WorkerEvent::StateChange { state });
    }

    async fn transition(
        &self,
        allowed: &[ServiceWorkerState],
        next: ServiceWorkerState,
    ) -> Result<(), ServiceWorkerError> {
        {
            let mut state = self.state.write().await;
            if !allowed.contains(&*state) {
                return Err(ServiceWorkerError::State(format!(
                    "cannot move from {:?} to {:?}",
                    *state, next
                )));
            }
            *state = next;
        }
        self.emit(WorkerEvent::StateChange { state: next });
        Ok(())
    }

    // ==================== Install ====================

    /// Populate the current cache generation with every manifest URL.
    ///
    /// Only a failure to open the cache fails the install. Individual assets
    /// that cannot be fetched or stored are logged and reported.
    pub async fn install(&self) -> Result<InstallReport, ServiceWorkerError> {
        use ServiceWorkerState::*;
        self.transition(&[Parsed, Installed, Redundant], Installing)
            .await?;

        let cache_name = self.config.cache_name.clone();
        let span = tracing::info_span!("install", cache = %cache_name);
        let result = self.populate(&cache_name).instrument(span).await;

        match &result {
            Ok(_) => self.set_state(Installed).await,
            Err(_) => self.set_state(Redundant).await,
        }
        result
    }

    async fn populate(&self, cache_name: &str) -> Result<InstallReport, ServiceWorkerError> {
        if let Err(err) = self.storage.open(cache_name).await {
            error!(error = %err, "Failed to open cache");
            return Err(err.into());
        }

        let fetches = self.config.manifest.iter().map(|url| {
            let request = Request::get(url.clone())
                .mode(RequestMode::Cors)
                .cache(CacheMode::Reload);
            async move {
                let key = request.clone();
                (key, self.fetcher.fetch(request).await)
            }
        });
        let results = join_all(fetches).await;

        let mut report = InstallReport {
            cache_name: cache_name.to_string(),
            ..Default::default()
        };

        for (request, result) in results {
            let url = request.url.clone();
            let reason = match result {
                Ok(response) if response.ok() => {
                    match self.storage.put(cache_name, &request, response).await {
                        Ok(()) => {
                            debug!(url = %url, "Asset cached");
                            report.cached.push(url);
                            continue;
                        }
                        Err(err) => format!("cache write failed: {err}"),
                    }
                }
                Ok(response) => format!("status {}", response.status),
                Err(err) => err.to_string(),
            };
            warn!(url = %url, reason = %reason, "Failed to cache asset");
            report.failed.push(InstallFailure { url, reason });
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );
        Ok(report)
    }

    // ==================== Fetch ====================

    /// Decide how to answer a request from the page.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        let rule = strategy::select(&request);
        trace!(
            request_id = request.id.raw(),
            url = %request.url,
            method = %request.method,
            rule = rule.name,
            "Fetch intercepted"
        );

        match rule.strategy {
            Strategy::Passthrough => Ok(FetchOutcome::Passthrough),
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        let url = request.url.clone();
        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                return Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(err) => err,
        };

        warn!(url = %url, error = %err, "Navigation failed, falling back to app shell");
        let shell = Request::get(self.config.shell_url.clone());
        match self.storage.match_any(&shell).await {
            Ok(Some(response)) => Ok(FetchOutcome::Respond {
                response,
                source: ResponseSource::ShellFallback,
            }),
            Ok(None) => {
                warn!(shell = %self.config.shell_url, "App shell not cached");
                Err(err.into())
            }
            Err(cache_err) => {
                warn!(error = %cache_err, "App shell lookup failed");
                Err(err.into())
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        match self.storage.match_any(&request).await {
            Ok(Some(response)) => {
                trace!(url = %request.url, "Cache hit");
                return Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(url = %request.url, error = %err, "Cache lookup failed"),
        }

        let response = self.fetcher.fetch(request.clone()).await?;
        match strategy::cache_decision(&request, &response, &self.config.origin) {
            CacheDecision::Store => self.cache_in_background(request, response.clone()),
            CacheDecision::Skip(reason) => {
                trace!(url = %request.url, ?reason, "Response not cached")
            }
        }

        Ok(FetchOutcome::Respond {
            response,
            source: ResponseSource::Network,
        })
    }

    /// Write a response copy into the current generation without holding up
    /// the caller. Failures are dropped.
    fn cache_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let cache = self.config.cache_name.clone();
        let events = self.event_tx.clone();

        tokio::spawn(async move {
            let url = request.url.clone();
            match storage.put(&cache, &request, response).await {
                Ok(()) => {
                    debug!(url = %url, cache = %cache, "Runtime response cached");
                    let _ = events.send(WorkerEvent::EntryCached { cache, url });
                }
                Err(err) => debug!(
                    request_id = request.id.raw(),
                    url = %url,
                    error = %err,
                    "Runtime cache write dropped"
                ),
            }
        });
    }

    // ==================== Activate ====================

    /// Delete every cache generation other than the current one.
    ///
    /// Returns the names deleted. Any deletion failure fails the activation
    /// and leaves the worker installed.
    pub async fn activate(&self) -> Result<Vec<String>, ServiceWorkerError> {
        use ServiceWorkerState::*;
        self.transition(&[Installed], Activating).await?;

        match self.evict_stale().await {
            Ok(deleted) => {
                self.set_state(Activated).await;
                info!(cache = %self.config.cache_name, deleted = deleted.len(), "Activated");
                Ok(deleted)
            }
            Err(err) => {
                self.set_state(Installed).await;
                Err(err)
            }
        }
    }

    async fn evict_stale(&self) -> Result<Vec<String>, ServiceWorkerError> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != &self.config.cache_name)
            .collect();

        let deletions = stale.iter().map(|name| async move {
            (name, self.storage.delete(name).await)
        });
        let results = join_all(deletions).await;

        let mut deleted = Vec::new();
        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(true) => {
                    info!(cache = %name, "Deleted stale cache");
                    self.emit(WorkerEvent::GenerationDeleted { name: name.clone() });
                    deleted.push(name.clone());
                }
                Ok(false) => debug!(cache = %name, "Stale cache already gone"),
                Err(err) => {
                    error!(cache = %name, error = %err, "Failed to delete stale cache");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(deleted),
        }
    }

    // ==================== Notifications ====================

    /// Show a notification with the configured icon.
    pub async fn show_notification(
        &self,
        title: impl Into<String>,
        mut options: NotificationOptions,
    ) -> Notification {
        options.icon = Some(self.config.notification_icon.clone());
        let notification = Notification::new(title, options);
        self.notifications.show(notification.clone()).await;
        debug!(tag = notification.tag(), "Notification shown");
        notification
    }

    /// Dismiss the clicked notification, then focus an existing window or
    /// open a new one.
    pub async fn handle_notification_click(
        &self,
        event: NotificationClickEvent,
    ) -> Result<ClickOutcome, ServiceWorkerError> {
        let tag = event.notification.tag();
        self.notifications.close(tag).await;
        debug!(tag, action = ?event.action, "Notification clicked");

        let windows = self.clients.match_all(ClientQuery::all_windows()).await;
        let target = windows
            .iter()
            .find(|c| c.focused)
            .or_else(|| windows.first());

        match target {
            Some(client) => {
                let client = self.clients.focus(&client.id).await?;
                Ok(ClickOutcome::Focused(client))
            }
            None => {
                let client = self.clients.open_window(&self.config.open_url).await?;
                Ok(ClickOutcome::Opened(client))
            }
        }
    }
}
