use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use swkit_net::{Fetcher, NetError, Request, Response};
use swkit_sw::{CacheError, CacheKey, CacheStorage, MemoryCacheStorage};
use tokio::sync::Semaphore;

/// Scripted network. Unknown URLs fail like an unreachable host.
#[allow(dead_code)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<Request>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::RequestFailed("network offline".to_string()));
        }
        self.routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| NetError::RequestFailed(format!("unreachable: {}", request.url)))
    }
}

/// Memory storage with failure injection and call counters.
#[allow(dead_code)]
pub struct InstrumentedStorage {
    pub inner: MemoryCacheStorage,
    pub fail_open: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub hold_puts: AtomicBool,
    put_gate: Semaphore,
    pub puts: AtomicUsize,
    pub lookups: AtomicUsize,
}

#[allow(dead_code)]
impl InstrumentedStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCacheStorage::new(),
            fail_open: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            hold_puts: AtomicBool::new(false),
            put_gate: Semaphore::new(0),
            puts: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        })
    }

    /// Let one held `put` proceed.
    pub fn release_put(&self) {
        self.put_gate.add_permits(1);
    }

    fn unavailable(op: &str) -> CacheError {
        CacheError::Unavailable(format!("{op} failed (injected)"))
    }
}

#[async_trait]
impl CacheStorage for InstrumentedStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Self::unavailable("open"));
        }
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable("delete"));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.inner.keys().await
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.hold_puts.load(Ordering::SeqCst) {
            let permit = self
                .put_gate
                .acquire()
                .await
                .map_err(|_| Self::unavailable("put"))?;
            permit.forget();
        }
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::unavailable("put"));
        }
        self.inner.put(name, request, response).await
    }

    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.match_in(name, request).await
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.match_any(request).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>, CacheError> {
        self.inner.entries(name).await
    }
}
