//! Persistent AI status cache keyed by worktree path.
//!
//! An entry is reused **only** when its stored content hash equals the
//! fingerprint of the current state; age alone never invalidates it.
//! Failed syntheses never touch the cache, so a valid entry survives outages.
//!
//! ## Persistence
//!
//! The whole map is one JSON document (`status-cache.json`), rewritten
//! atomically (temp file + rename) after each insert. Missing or corrupt
//! files load as an empty cache. Async callers use [`SummaryCache::record`],
//! which writes the document on tokio's blocking pool.

use crate::error::{CanopyError, Result};
use crate::fingerprint::Fingerprint;
use crate::shard::ShardedMap;
use crate::types::AiStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const CACHE_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: AiStatus,
    pub content_hash: Fingerprint,
    pub timestamp: DateTime<Utc>,
    pub model: String,
}

impl CacheEntry {
    fn new(result: AiStatus, content_hash: Fingerprint, model: &str) -> Self {
        Self {
            result,
            content_hash,
            timestamp: Utc::now(),
            model: model.to_string(),
        }
    }
}

/// Durable key-value backing for [`SummaryCache`].
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheEntry>>;
    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

/// JSON file store with atomic full-document saves.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        let content = match fs_err::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(CanopyError::Io {
                    context: format!("reading {}", self.path.display()),
                    source: e,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let file: CacheFile = serde_json::from_str(&content).map_err(|e| CanopyError::Json {
            context: format!("parsing {}", self.path.display()),
            source: e,
        })?;

        if file.version != CACHE_FILE_VERSION {
            tracing::info!(
                found = file.version,
                expected = CACHE_FILE_VERSION,
                "Discarding status cache with unknown version"
            );
            return Ok(HashMap::new());
        }
        Ok(file.entries)
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs_err::create_dir_all(dir).map_err(|e| CanopyError::Io {
            context: format!("creating {}", dir.display()),
            source: e,
        })?;

        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: entries.clone(),
        };
        let payload = serde_json::to_vec_pretty(&file).map_err(|e| CanopyError::Json {
            context: "serializing status cache".to_string(),
            source: e,
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CanopyError::Io {
            context: format!("creating temp file in {}", dir.display()),
            source: e,
        })?;
        tmp.write_all(&payload).map_err(|e| CanopyError::Io {
            context: format!("writing temp file for {}", self.path.display()),
            source: e,
        })?;
        tmp.persist(&self.path).map_err(|e| CanopyError::Io {
            context: format!("persisting temp file to {}", self.path.display()),
            source: e.error,
        })?;
        Ok(())
    }
}

/// In-memory store, for tests and for running without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        *self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = entries.clone();
        Ok(())
    }
}

/// Fingerprint-validated status cache shared across worktrees.
pub struct SummaryCache {
    entries: ShardedMap<CacheEntry>,
    store: Box<dyn CacheStore>,
    /// Serializes document writes; reads and in-memory updates never take it.
    persist_lock: Mutex<()>,
}

impl SummaryCache {
    /// Loads existing entries, starting empty if the store is unreadable.
    pub fn open(store: Box<dyn CacheStore>) -> Self {
        let entries = match store.load() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "Status cache unreadable; starting empty");
                HashMap::new()
            }
        };
        Self {
            entries: ShardedMap::from_map(entries),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::<MemoryStore>::default())
    }

    /// Returns the cached status iff its content hash matches `current`.
    pub fn lookup(&self, key: &str, current: &Fingerprint) -> Option<AiStatus> {
        let entry = self.entries.get(key)?;
        if &entry.content_hash == current {
            tracing::debug!(key, "Status cache hit");
            Some(entry.result)
        } else {
            tracing::debug!(key, "Status cache stale (content changed)");
            None
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key)
    }

    /// Records a successful synthesis and persists the document.
    ///
    /// Persistence failures are logged, not returned: the in-memory entry
    /// is still valid for this process.
    pub fn insert(&self, key: &str, result: AiStatus, content_hash: Fingerprint, model: &str) {
        self.entries.insert(key.to_string(), CacheEntry::new(result, content_hash, model));
        self.persist();
    }

    /// [`insert`](Self::insert) for async callers: the entry is visible
    /// immediately, the document write runs off the async worker.
    pub async fn record(
        self: &Arc<Self>,
        key: &str,
        result: AiStatus,
        content_hash: Fingerprint,
        model: &str,
    ) {
        self.entries.insert(key.to_string(), CacheEntry::new(result, content_hash, model));
        let cache = Arc::clone(self);
        if let Err(err) = tokio::task::spawn_blocking(move || cache.persist()).await {
            tracing::warn!(error = %err, "Status cache write task failed");
        }
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = self.store.save(&self.entries.snapshot()) {
            tracing::warn!(error = %err, "Failed to persist status cache");
        }
    }
}
