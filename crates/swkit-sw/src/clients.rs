//! Clients API: windows under the application's origin.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::ServiceWorkerError;

/// A client (browser tab or window, or a worker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Whether focused.
    pub focused: bool,

    /// Whether controlled by the current worker generation.
    pub controlled: bool,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// Options for [`Clients::match_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientQuery {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

impl ClientQuery {
    /// Every window, controlled or not.
    pub fn all_windows() -> Self {
        Self {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        }
    }

    fn accepts(&self, client: &Client) -> bool {
        if !self.include_uncontrolled && !client.controlled {
            return false;
        }
        match self.client_type {
            ClientType::All => true,
            t => client.client_type == t,
        }
    }
}

/// Access to the clients of this origin.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Matching clients in enumeration order.
    async fn match_all(&self, query: ClientQuery) -> Vec<Client>;

    /// Focus a window client.
    async fn focus(&self, id: &str) -> Result<Client, ServiceWorkerError>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> Result<Client, ServiceWorkerError>;
}

/// In-memory client registry.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<Vec<Client>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client.
    pub async fn add(&self, client: Client) {
        self.clients.write().await.push(client);
    }

    /// Remove a client.
    pub async fn remove(&self, id: &str) -> Option<Client> {
        let mut clients = self.clients.write().await;
        let index = clients.iter().position(|c| c.id == id)?;
        Some(clients.remove(index))
    }

    /// Snapshot of all clients.
    pub async fn all(&self) -> Vec<Client> {
        self.clients.read().await.clone()
    }
}

#[async_trait]
impl Clients for ClientRegistry {
    async fn match_all(&self, query: ClientQuery) -> Vec<Client> {
        self.clients
            .read()
            .await
            .iter()
            .filter(|c| query.accepts(c))
            .cloned()
            .collect()
    }

    async fn focus(&self, id: &str) -> Result<Client, ServiceWorkerError> {
        let mut clients = self.clients.write().await;
        let target = clients
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ServiceWorkerError::Client(format!("no client {id}")))?;
        if target.client_type != ClientType::Window {
            return Err(ServiceWorkerError::Client(
                "Can only focus window clients".to_string(),
            ));
        }

        let mut focused = None;
        for client in clients.iter_mut() {
            client.focused = client.id == id;
            if client.focused {
                focused = Some(client.clone());
            }
        }
        debug!(client = id, "Client focused");
        focused.ok_or_else(|| ServiceWorkerError::Client(format!("no client {id}")))
    }

    async fn open_window(&self, url: &Url) -> Result<Client, ServiceWorkerError> {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let client = Client {
            id: format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed)),
            url: url.clone(),
            client_type: ClientType::Window,
            focused: true,
            controlled: false,
        };

        let mut clients = self.clients.write().await;
        for other in clients.iter_mut() {
            other.focused = false;
        }
        clients.push(client.clone());
        debug!(client = %client.id, url = %url, "Window opened");
        Ok(client)
    }
}
