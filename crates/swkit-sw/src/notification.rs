//! System notifications raised by the worker.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Options passed alongside a notification title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: bool,
    /// Free-form payload handed back on click.
    pub data: serde_json::Value,
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

impl Notification {
    /// Build a notification. A tag is generated when the options carry none.
    pub fn new(title: impl Into<String>, mut options: NotificationOptions) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        if options.tag.is_none() {
            options.tag = Some(format!(
                "notification-{}",
                COUNTER.fetch_add(1, Ordering::Relaxed)
            ));
        }
        Self {
            title: title.into(),
            options,
        }
    }

    pub fn tag(&self) -> &str {
        self.options.tag.as_deref().unwrap_or_default()
    }
}

/// A click on a notification.
#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
    pub notification: Notification,
    /// Action button id, if an action was clicked.
    pub action: Option<String>,
}

/// Platform notification surface.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Display a notification, replacing any with the same tag.
    async fn show(&self, notification: Notification);

    /// Dismiss the notification with `tag`. Returns whether one was shown.
    async fn close(&self, tag: &str) -> bool;
}

/// In-memory notification tray.
#[derive(Debug, Default)]
pub struct NotificationTray {
    shown: RwLock<Vec<Notification>>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently displayed notifications.
    pub async fn active(&self) -> Vec<Notification> {
        self.shown.read().await.clone()
    }
}

#[async_trait]
impl NotificationCenter for NotificationTray {
    async fn show(&self, notification: Notification) {
        let mut shown = self.shown.write().await;
        shown.retain(|n| n.tag() != notification.tag());
        shown.push(notification);
    }

    async fn close(&self, tag: &str) -> bool {
        let mut shown = self.shown.write().await;
        let before = shown.len();
        shown.retain(|n| n.tag() != tag);
        shown.len() != before
    }
}
