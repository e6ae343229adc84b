//! Narrow key-value interface to the external metrics/cache store.
//!
//! Keys are [`Fingerprint`]s over (algorithm, graph identity, changed-node
//! set, parameters). Writes are idempotent: the same inputs always produce
//! the same key and the same value, so serving from the store and
//! recomputing are indistinguishable.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Content fingerprint used as a store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint one request.
    ///
    /// `changed_nodes` is sorted and deduplicated first, so the caller's
    /// ordering never changes the key. `params` is hashed in its canonical
    /// `serde_json` encoding (object keys sorted).
    #[must_use]
    pub fn new<'a>(
        algorithm: &str,
        graph_hash: &str,
        changed_nodes: impl IntoIterator<Item = &'a str>,
        params: &serde_json::Value,
    ) -> Self {
        let changed: BTreeSet<&str> = changed_nodes.into_iter().collect();

        let mut hasher = blake3::Hasher::new();
        for part in [algorithm, graph_hash] {
            hasher.update(part.as_bytes());
            hasher.update(b"\x00");
        }
        for id in &changed {
            hasher.update(id.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x00");
        hasher.update(params.to_string().as_bytes());
        Self(format!("blake3:{}", hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store backend failure. Never fatal to a request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("metrics store unavailable: {0}")]
    Unavailable(String),

    #[error("metrics store entry for {key} could not be decoded: {reason}")]
    Corrupt { key: String, reason: String },
}

/// External metrics/cache store.
///
/// Implementations must be safe to share between concurrent requests.
/// "At most one computation per fingerprint" is the implementation's
/// business; the engine never locks around it.
pub trait MetricsStore: Send + Sync {
    /// Fetch a cached value.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn get(&self, key: &Fingerprint) -> Result<Option<serde_json::Value>, StoreError>;

    /// Store a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn put(&self, key: &Fingerprint, value: serde_json::Value) -> Result<(), StoreError>;

    /// Drop a cached value. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn invalidate(&self, key: &Fingerprint) -> Result<(), StoreError>;
}

/// Process-local store for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<Fingerprint, serde_json::Value>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Fingerprint, serde_json::Value>>, StoreError>
    {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

impl MetricsStore for InMemoryStore {
    fn get(&self, key: &Fingerprint) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &Fingerprint, value: serde_json::Value) -> Result<(), StoreError> {
        self.lock()?.insert(key.clone(), value);
        Ok(())
    }

    fn invalidate(&self, key: &Fingerprint) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
