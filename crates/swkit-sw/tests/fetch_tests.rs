//! Fetch handler: navigation fallback, cache-first and opportunistic caching.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use common::{
    next_entry_cached, origin, shell_html, test_config, worker_with, InstrumentedStorage,
    MockFetcher,
};
use http::{header, HeaderValue, Method};
use swkit_net::{Request, Response, ResponseType};
use swkit_sw::{CacheStorage, FetchOutcome, ResponseSource, ServiceWorkerError};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn respond(outcome: FetchOutcome) -> (Response, ResponseSource) {
    match outcome {
        FetchOutcome::Respond { response, source } => (response, source),
        FetchOutcome::Passthrough => panic!("expected a response, got passthrough"),
    }
}

#[tokio::test]
async fn test_cached_response_is_served_unchanged() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let stored = Response::new(200, Bytes::from_static(b"\x00\x01binary\xff"))
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static("font/woff2"))
        .with_header(header::CACHE_CONTROL, HeaderValue::from_static("max-age=31536000"))
        .with_url(url("https://fonts.example.com/inter.woff2"));
    let request = Request::get(url("https://fonts.example.com/inter.woff2"));
    storage
        .put("launcher-v1", &request, stored.clone())
        .await
        .unwrap();

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher.clone());

    let (response, source) = respond(worker.handle_fetch(request).await.unwrap());

    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response, stored);
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_installed_assets_are_served_unchanged_offline() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let css = Response::new(200, "body{margin:0}")
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/css"))
        .with_url(url("https://launcher.test/index.css"));
    let font = Response::new(200, Bytes::from_static(b"wOF2\x00\x01\xff"))
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static("font/woff2"))
        .with_type(ResponseType::Cors);
    fetcher.respond("https://launcher.test/index.css", css.clone());
    fetcher.respond("https://fonts.example.com/inter.woff2", font.clone());

    let config = test_config(
        "launcher-v1",
        &["/index.css", "https://fonts.example.com/inter.woff2"],
    );
    let (worker, _rx) = worker_with(&config, storage, fetcher.clone());
    assert!(worker.install().await.unwrap().is_complete());
    fetcher.set_offline(true);

    for (target, scripted) in [
        ("https://launcher.test/index.css", css),
        ("https://fonts.example.com/inter.woff2", font),
    ] {
        let (response, source) =
            respond(worker.handle_fetch(Request::get(url(target))).await.unwrap());
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response, scripted);
    }
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn test_older_generation_still_serves_hits() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let request = Request::get(url("https://launcher.test/index.css"));
    storage
        .put("launcher-v0", &request, Response::new(200, "old"))
        .await
        .unwrap();

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let (response, source) = respond(worker.handle_fetch(request).await.unwrap());
    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response.body, Bytes::from_static(b"old"));
}

#[tokio::test]
async fn test_navigation_prefers_network() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    fetcher.respond("https://launcher.test/settings", shell_html("fresh"));
    storage
        .put("launcher-v1", &Request::get(origin()), shell_html("stale"))
        .await
        .unwrap();

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let request = Request::navigate(url("https://launcher.test/settings"));
    let (response, source) = respond(worker.handle_fetch(request).await.unwrap());

    assert_eq!(source, ResponseSource::Network);
    assert!(response.text().unwrap().contains("fresh"));
}

#[tokio::test]
async fn test_navigation_falls_back_to_shell_offline() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let shell = shell_html("cached");
    storage
        .put("launcher-v1", &Request::get(origin()), shell.clone())
        .await
        .unwrap();
    fetcher.set_offline(true);

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let request = Request::navigate(url("https://launcher.test/deep/route?tab=2"));
    let (response, source) = respond(worker.handle_fetch(request).await.unwrap());

    assert_eq!(source, ResponseSource::ShellFallback);
    assert_eq!(response, shell);
}

#[tokio::test]
async fn test_navigation_error_status_is_not_a_fallback() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    fetcher.respond("https://launcher.test/gone", Response::new(404, "not found"));
    storage
        .put("launcher-v1", &Request::get(origin()), shell_html("cached"))
        .await
        .unwrap();

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let request = Request::navigate(url("https://launcher.test/gone"));
    let (response, source) = respond(worker.handle_fetch(request).await.unwrap());

    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_navigation_without_shell_surfaces_network_error() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    fetcher.set_offline(true);

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let request = Request::navigate(url("https://launcher.test/"));
    let result = worker.handle_fetch(request).await;

    assert!(matches!(result, Err(ServiceWorkerError::Network(_))));
}

#[tokio::test]
async fn test_non_get_is_passed_through() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage.clone(), fetcher.clone());

    let post = Request::post(url("https://api.example.com/v1/generate"), Bytes::from("{}"));
    let put = Request::get(url("https://launcher.test/profile")).method(Method::PUT);

    assert_eq!(worker.handle_fetch(post).await.unwrap(), FetchOutcome::Passthrough);
    assert_eq!(worker.handle_fetch(put).await.unwrap(), FetchOutcome::Passthrough);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(storage.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_opaque_response_is_cached_in_background() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let script = url("https://cdn.example.com/tailwind.js");
    fetcher.respond(script.as_str(), Response::opaque(script.clone(), "/* tw */"));

    let config = test_config("launcher-v1", &["/"]);
    let (worker, mut rx) = worker_with(&config, storage.clone(), fetcher.clone());

    let (response, source) = respond(worker.handle_fetch(Request::get(script.clone())).await.unwrap());
    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.response_type, ResponseType::Opaque);

    assert_eq!(next_entry_cached(&mut rx).await, Some(script.clone()));

    let (replayed, source) = respond(worker.handle_fetch(Request::get(script.clone())).await.unwrap());
    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(replayed, response);
    assert_eq!(fetcher.call_count(script.as_str()), 1);
}

#[tokio::test]
async fn test_cross_origin_success_is_cached() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let module = url("https://esm.sh/react@19");
    fetcher.respond(
        module.as_str(),
        Response::new(200, "export default {}").with_type(ResponseType::Cors),
    );

    let config = test_config("launcher-v1", &["/"]);
    let (worker, mut rx) = worker_with(&config, storage.clone(), fetcher);

    worker.handle_fetch(Request::get(module.clone())).await.unwrap();

    assert_eq!(next_entry_cached(&mut rx).await, Some(module.clone()));
    assert!(storage
        .match_in("launcher-v1", &Request::get(module))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_same_origin_success_is_not_cached() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let asset = url("https://launcher.test/late-chunk.js");
    fetcher.respond(asset.as_str(), Response::new(200, "chunk"));

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage.clone(), fetcher);

    let (response, _) = respond(worker.handle_fetch(Request::get(asset.clone())).await.unwrap());
    assert_eq!(response.status, 200);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cross_origin_error_status_is_not_cached() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let missing = url("https://cdn.example.com/missing.js");
    fetcher.respond(
        missing.as_str(),
        Response::new(404, "nope").with_type(ResponseType::Cors),
    );

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage.clone(), fetcher);

    let (response, source) = respond(worker.handle_fetch(Request::get(missing)).await.unwrap());
    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.status, 404);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_response_is_returned_uncached() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    let broken = url("https://cdn.example.com/broken.js");
    fetcher.respond(broken.as_str(), Response::error());

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage.clone(), fetcher);

    let (response, _) = respond(worker.handle_fetch(Request::get(broken)).await.unwrap());
    assert!(response.is_error());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subresource_miss_offline_is_an_error() {
    let storage = InstrumentedStorage::new();
    let fetcher = MockFetcher::new();
    fetcher.set_offline(true);

    let config = test_config("launcher-v1", &["/"]);
    let (worker, _rx) = worker_with(&config, storage, fetcher);

    let result = worker
        .handle_fetch(Request::get(url("https://cdn.example.com/app.js")))
        .await;
    assert!(matches!(result, Err(ServiceWorkerError::Network(_))));
}

#[tokio::test]
async fn test_response_does_not_wait_for_cache_write() {
    let storage = InstrumentedStorage::new();
    storage.hold_puts.store(true, Ordering::SeqCst);
    let fetcher = MockFetcher::new();
    let font = url("https://fonts.example.com/inter.css");
    fetcher.respond(font.as_str(), Response::opaque(font.clone(), "@font-face{}"));

    let config = test_config("launcher-v1", &["/"]);
    let (worker, mut rx) = worker_with(&config, storage.clone(), fetcher);

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        worker.handle_fetch(Request::get(font.clone())),
    )
    .await
    .expect("fetch blocked on the cache write")
    .unwrap();
    assert!(matches!(outcome, FetchOutcome::Respond { .. }));
    assert!(storage
        .match_in("launcher-v1", &Request::get(font.clone()))
        .await
        .unwrap()
        .is_none());

    storage.release_put();
    assert_eq!(next_entry_cached(&mut rx).await, Some(font));
}

#[tokio::test]
async fn test_cache_write_failure_is_dropped() {
    let storage = InstrumentedStorage::new();
    storage.fail_put.store(true, Ordering::SeqCst);
    let fetcher = MockFetcher::new();
    let script = url("https://cdn.example.com/app.js");
    fetcher.respond(script.as_str(), Response::opaque(script.clone(), "app"));

    let config = test_config("launcher-v1", &["/"]);
    let (worker, mut rx) = worker_with(&config, storage.clone(), fetcher);

    let (response, source) = respond(worker.handle_fetch(Request::get(script)).await.unwrap());
    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.body, Bytes::from_static(b"app"));

    assert_eq!(next_entry_cached(&mut rx).await, None);
    assert_eq!(storage.puts.load(Ordering::SeqCst), 1);
}
