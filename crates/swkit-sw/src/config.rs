//! Worker configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::manifest::Manifest;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Offline cache worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name of the current cache generation. Bump it whenever the manifest
    /// or the worker logic changes.
    pub cache_name: String,

    /// Origin of the application.
    pub origin: String,

    /// App shell entry point served when a navigation fails.
    pub shell_path: String,

    /// Path opened when a notification is clicked and no window exists.
    pub open_path: String,

    /// Icon injected into every notification.
    pub notification_icon: String,

    /// Assets pre-cached at install time.
    pub manifest: Manifest,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "app-launcher-cache-v1".to_string(),
            origin: "http://localhost:5173/".to_string(),
            shell_path: "/".to_string(),
            open_path: "/".to_string(),
            notification_icon: "/icon.svg".to_string(),
            manifest: Manifest::new([
                "/",
                "/index.html",
                "/index.css",
                "/index.tsx",
                "/manifest.json",
                "/icon.svg",
                "https://cdn.tailwindcss.com",
                "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap",
                "https://esm.sh/react@^19.1.0",
                "https://esm.sh/react-dom@^19.1.0/client",
                "https://esm.sh/@google/genai@^1.9.0",
            ]),
        }
    }
}

/// Configuration with every URL resolved against the origin.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub cache_name: String,
    pub origin: Url,
    pub shell_url: Url,
    pub open_url: Url,
    pub notification_icon: String,
    pub manifest: Vec<Url>,
}

impl WorkerConfig {
    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Check the configuration without resolving it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve().map(|_| ())
    }

    /// Resolve paths and manifest entries against the origin.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::Invalid("cache_name must not be empty".into()));
        }
        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin {:?}: {}", self.origin, e)))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "origin {} is not http(s)",
                origin
            )));
        }

        let join = |what: &str, path: &str| {
            origin
                .join(path)
                .map_err(|e| ConfigError::Invalid(format!("{what} {path:?}: {e}")))
        };

        Ok(ResolvedConfig {
            cache_name: self.cache_name.clone(),
            shell_url: join("shell_path", &self.shell_path)?,
            open_url: join("open_path", &self.open_path)?,
            notification_icon: self.notification_icon.clone(),
            manifest: self.manifest.resolve(&origin)?,
            origin,
        })
    }
}
