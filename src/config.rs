use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a live collection subscription.
///
/// Deserializable so applications can load it alongside the rest of their
/// configuration:
///
/// ```
/// use live_mirror::SyncConfig;
///
/// let config: SyncConfig = serde_json::from_str(r#"{"name":"chat","poll_interval_ms":25}"#).unwrap();
/// assert_eq!(config.poll_interval().as_millis(), 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name used for the worker thread and in log lines.
    pub name: String,
    /// How long a single poll of the change stream may block.
    pub poll_interval_ms: u64,
    /// Overrides the record type's collection name in log lines.
    pub collection: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name: "live-sync".to_string(),
            poll_interval_ms: 50,
            collection: None,
        }
    }
}

impl SyncConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// The collection name to report, falling back to `default`.
    pub fn collection_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.collection.as_deref().unwrap_or(default)
    }
}
