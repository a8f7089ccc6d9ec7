//! Asset manifest: the fixed list of URLs pre-cached at install time.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigError;

/// Ordered, de-duplicated list of absolute and root-relative URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Build a manifest, keeping the first occurrence of each entry.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into();
            let entry = entry.trim();
            if entry.is_empty() || deduped.iter().any(|e| e == entry) {
                continue;
            }
            deduped.push(entry.to_string());
        }
        Self { entries: deduped }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against the application origin.
    ///
    /// Entries resolving to the same absolute URL collapse to one.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, ConfigError> {
        let mut urls: Vec<Url> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let url = origin
                .join(entry)
                .map_err(|e| ConfigError::Invalid(format!("manifest entry {entry:?}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "manifest entry {entry:?} is not http(s)"
                )));
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }
}

impl From<Vec<String>> for Manifest {
    fn from(entries: Vec<String>) -> Self {
        Self::new(entries)
    }
}

impl From<Manifest> for Vec<String> {
    fn from(manifest: Manifest) -> Self {
        manifest.entries
    }
}
