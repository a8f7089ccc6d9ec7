//! Cache Storage: named cache generations holding request → response pairs.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use swkit_net::{Request, Response, ResponseType};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Errors raised by a cache storage backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),

    #[error("Cache not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Identity of a cached request.
///
/// Fragments are not part of the identity, matching browser cache lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}

impl CacheKey {
    /// Key for a GET of `url`.
    pub fn get(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: Method::GET,
            url: url.into(),
        }
    }

    /// Key for a request. Non-GET requests have no key.
    pub fn for_request(request: &Request) -> Result<Self, CacheError> {
        if request.method != Method::GET {
            return Err(CacheError::UnsupportedMethod(request.method.to_string()));
        }
        Ok(Self::get(&request.url))
    }
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub response: Response,
    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

/// One cache generation.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    entries: HashMap<CacheKey, CacheEntry>,

    /// Insertion order of keys.
    order: Vec<CacheKey>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Match a key.
    pub fn match_key(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store an entry, replacing any entry with the same key.
    pub fn put(&mut self, key: CacheKey, response: Response, cached_at: u64) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                response,
                cached_at,
            },
        );
    }

    /// Delete entry.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entries_in_order(&self) -> impl Iterator<Item = &CacheEntry> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }
}

/// Browser-style cache storage (`caches`).
///
/// Implementations provide entry-level atomicity: concurrent writes to
/// different keys do not conflict, writes to the same key are last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if absent.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Check if a cache exists.
    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Delete a cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// All cache names in creation order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Store a response for a GET request. Opens the cache if needed.
    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), CacheError>;

    /// Look up a request in one cache.
    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Look up a request across all caches in creation order.
    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Keys stored in one cache, in insertion order.
    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>, CacheError>;
}

#[derive(Debug, Default)]
struct StorageInner {
    caches: HashMap<String, Cache>,
    order: Vec<String>,
}

impl StorageInner {
    fn open(&mut self, name: &str) -> &mut Cache {
        if !self.caches.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }
}

/// In-process cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    inner: RwLock<StorageInner>,
}

impl MemoryCacheStorage {
    /// Create new empty cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the whole storage as a serializable snapshot.
    pub async fn snapshot(&self) -> StorageSnapshot {
        let inner = self.inner.read().await;
        let caches = inner
            .order
            .iter()
            .filter_map(|name| inner.caches.get(name))
            .map(|cache| CacheSnapshot {
                name: cache.name.clone(),
                entries: cache.entries_in_order().map(EntrySnapshot::from).collect(),
            })
            .collect();
        StorageSnapshot { caches }
    }

    /// Build a storage from a snapshot.
    pub fn restore(snapshot: StorageSnapshot) -> Result<Self, CacheError> {
        let mut inner = StorageInner::default();
        for cache in snapshot.caches {
            let target = inner.open(&cache.name);
            for entry in cache.entries {
                let (key, response, cached_at) = entry.into_parts()?;
                target.put(key, response, cached_at);
            }
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Load storage from a JSON snapshot file. A missing file yields empty storage.
    pub async fn load(path: &Path) -> Result<Self, CacheError> {
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "No cache snapshot, starting empty");
            return Ok(Self::new());
        }
        let contents = tokio::fs::read_to_string(path).await?;
        let snapshot: StorageSnapshot = serde_json::from_str(&contents)
            .map_err(|e| CacheError::Snapshot(format!("invalid snapshot {}: {}", path.display(), e)))?;
        let storage = Self::restore(snapshot)?;
        info!(path = %path.display(), "Cache snapshot loaded");
        Ok(storage)
    }

    /// Write storage to a JSON snapshot file, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = self.snapshot().await;
        let data = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CacheError::Snapshot(e.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        debug!(path = %path.display(), caches = snapshot.caches.len(), "Cache snapshot saved");
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        self.inner.write().await.open(name);
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.inner.read().await.caches.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut inner = self.inner.write().await;
        let removed = inner.caches.remove(name).is_some();
        if removed {
            inner.order.retain(|n| n != name);
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), CacheError> {
        let key = CacheKey::for_request(request)?;
        let mut inner = self.inner.write().await;
        inner.open(name).put(key, response, now_millis());
        Ok(())
    }

    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        let Ok(key) = CacheKey::for_request(request) else {
            return Ok(None);
        };
        let inner = self.inner.read().await;
        Ok(inner
            .caches
            .get(name)
            .and_then(|cache| cache.match_key(&key))
            .map(|entry| entry.response.clone()))
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let Ok(key) = CacheKey::for_request(request) else {
            return Ok(None);
        };
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|name| inner.caches.get(name))
            .find_map(|cache| cache.match_key(&key))
            .map(|entry| entry.response.clone()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>, CacheError> {
        self.inner
            .read()
            .await
            .caches
            .get(name)
            .map(Cache::keys)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ==================== Snapshots ====================

/// Serializable form of a whole cache storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub caches: Vec<CacheSnapshot>,
}

/// Serializable form of one cache generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub name: String,
    pub entries: Vec<EntrySnapshot>,
}

/// Serializable form of one entry. Header values and bodies are base64 so
/// non-UTF-8 bytes survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub method: String,
    pub url: String,
    pub cached_at: u64,
    pub response_url: Option<Url>,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl From<&CacheEntry> for EntrySnapshot {
    fn from(entry: &CacheEntry) -> Self {
        let response = &entry.response;
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    general_purpose::STANDARD.encode(value.as_bytes()),
                )
            })
            .collect();
        Self {
            method: entry.key.method.to_string(),
            url: entry.key.url.clone(),
            cached_at: entry.cached_at,
            response_url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type,
            headers,
            body: general_purpose::STANDARD.encode(&response.body),
        }
    }
}

impl EntrySnapshot {
    fn into_parts(self) -> Result<(CacheKey, Response, u64), CacheError> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|e| CacheError::Snapshot(format!("bad method {}: {}", self.method, e)))?;
        if method != Method::GET {
            return Err(CacheError::UnsupportedMethod(self.method));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| CacheError::Snapshot(format!("bad header name {name}: {e}")))?;
            let bytes = general_purpose::STANDARD
                .decode(value)
                .map_err(|e| CacheError::Snapshot(format!("bad header value for {name}: {e}")))?;
            let value = HeaderValue::from_bytes(&bytes)
                .map_err(|e| CacheError::Snapshot(format!("bad header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        let body = general_purpose::STANDARD
            .decode(&self.body)
            .map_err(|e| CacheError::Snapshot(format!("bad body for {}: {}", self.url, e)))?;

        let response = Response {
            url: self.response_url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: body.into(),
            response_type: self.response_type,
        };
        Ok((
            CacheKey {
                method,
                url: self.url,
            },
            response,
            self.cached_at,
        ))
    }
}
