//! Subcommand implementations.

use http::Method;
use swkit_common::{Result, SwKitError};
use swkit_net::{Fetcher, Request};
use swkit_sw::{
    CacheStorage, ClickOutcome, FetchOutcome, NotificationClickEvent, NotificationOptions,
    OfflineCacheWorker, ServiceWorkerError, WorkerEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use url::Url;

pub async fn install(worker: &OfflineCacheWorker) -> Result<()> {
    let report = worker.install().await?;

    println!("Cache generation: {}", report.cache_name);
    println!("  Cached: {}", report.cached.len());
    for url in &report.cached {
        println!("    {url}");
    }
    println!("  Failed: {}", report.failed.len());
    for failure in &report.failed {
        println!("    {} ({})", failure.url, failure.reason);
    }
    Ok(())
}

pub async fn activate(worker: &OfflineCacheWorker) -> Result<()> {
    install(worker).await?;
    let deleted = worker.activate().await?;

    if deleted.is_empty() {
        println!("No stale cache generations");
    } else {
        println!("Deleted cache generations:");
        for name in deleted {
            println!("  {name}");
        }
    }
    Ok(())
}

pub async fn fetch(
    worker: &OfflineCacheWorker,
    fetcher: &dyn Fetcher,
    url: &str,
    navigate: bool,
    method: &str,
) -> Result<()> {
    let url = Url::parse(url)
        .map_err(|e| SwKitError::InvalidArgument(format!("invalid URL {url}: {e}")))?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| SwKitError::InvalidArgument(format!("invalid method {method}: {e}")))?;

    let request = if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    }
    .method(method);

    let (response, source) = match worker.handle_fetch(request.clone()).await? {
        FetchOutcome::Respond { response, source } => (response, format!("{source:?}")),
        FetchOutcome::Passthrough => {
            let response = fetcher
                .fetch(request)
                .await
                .map_err(ServiceWorkerError::from)?;
            (response, "Passthrough".to_string())
        }
    };

    println!("Source:   {source}");
    println!("Status:   {} {}", response.status, response.status_text);
    println!("Type:     {:?}", response.response_type);
    println!("Bytes:    {}", response.body.len());
    if let Some(content_type) = response.header("content-type") {
        println!("Content:  {content_type}");
    }
    Ok(())
}

pub async fn caches(storage: &dyn CacheStorage) -> Result<()> {
    let names = storage.keys().await.map_err(ServiceWorkerError::from)?;
    if names.is_empty() {
        println!("No cache generations");
        return Ok(());
    }

    for name in names {
        let entries = storage
            .entries(&name)
            .await
            .map_err(ServiceWorkerError::from)?;
        println!("{name} ({} entries)", entries.len());
        for key in entries {
            println!("  {} {}", key.method, key.url);
        }
    }
    Ok(())
}

pub async fn notify(
    worker: &OfflineCacheWorker,
    title: String,
    body: Option<String>,
) -> Result<()> {
    let notification = worker
        .show_notification(
            title,
            NotificationOptions {
                body,
                ..Default::default()
            },
        )
        .await;
    println!(
        "Shown:    {} [{}] icon={}",
        notification.title,
        notification.tag(),
        notification.options.icon.as_deref().unwrap_or("-")
    );

    let outcome = worker
        .handle_notification_click(NotificationClickEvent {
            notification,
            action: None,
        })
        .await?;
    match outcome {
        ClickOutcome::Focused(client) => println!("Focused:  {} ({})", client.id, client.url),
        ClickOutcome::Opened(client) => println!("Opened:   {} ({})", client.id, client.url),
    }
    Ok(())
}

/// Wait for background cache writes and log what they stored.
pub async fn drain_events(mut events: UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::EntryCached { cache, url } => {
                info!(cache = %cache, url = %url, "Entry cached")
            }
            other => debug!(event = ?other, "Worker event"),
        }
    }
}
