use std::sync::Arc;
use std::time::Duration;

use http::{header, HeaderValue};
use swkit_net::{Fetcher, Response};
use swkit_sw::{CacheStorage, Manifest, OfflineCacheWorker, WorkerConfig, WorkerEvent};
use tokio::sync::mpsc;
use url::Url;

pub const ORIGIN: &str = "https://launcher.test/";

#[allow(dead_code)]
pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// Configuration for the test origin with the given manifest.
#[allow(dead_code)]
pub fn test_config(cache_name: &str, manifest: &[&str]) -> WorkerConfig {
    WorkerConfig {
        cache_name: cache_name.to_string(),
        origin: ORIGIN.to_string(),
        manifest: Manifest::new(manifest.iter().copied()),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn worker_with(
    config: &WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
) -> (OfflineCacheWorker, mpsc::UnboundedReceiver<WorkerEvent>) {
    OfflineCacheWorker::new(config, storage, fetcher).unwrap()
}

/// The app shell document.
#[allow(dead_code)]
pub fn shell_html(version: &str) -> Response {
    Response::new(200, format!("<!doctype html><div id=\"root\" data-v=\"{version}\"></div>"))
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"))
        .with_header(header::ETAG, HeaderValue::from_static("\"shell\""))
}

/// Wait for the next background cache write.
#[allow(dead_code)]
pub async fn next_entry_cached(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Option<Url> {
    let wait = async {
        while let Some(event) = rx.recv().await {
            if let WorkerEvent::EntryCached { url, .. } = event {
                return Some(url);
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .ok()
        .flatten()
}
