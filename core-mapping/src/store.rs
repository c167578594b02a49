//! Mapping store implementation.
//!
//! On-disk shape: `{ "<source id>": { "destinationDocId": "...",
//! "canonicalSourceUrl": "..." }, ... }`. Earlier deployments stored bare
//! scalar values; those still parse (via an untagged compat variant) but are
//! invisible to the strict accessor and get overwritten on the next
//! successful upload.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("mapping store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("mapping store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Structured mapping value: one destination document per source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub destination_doc_id: String,
    pub canonical_source_url: String,
}

/// Stored value, tolerating legacy scalar entries on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MappingValue {
    Entry(MappingEntry),
    Legacy(serde_json::Value),
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, MappingValue>,
    loaded: bool,
}

/// Thread-safe, lazily hydrated id-mapping store.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl MappingStore {
    /// Create a store backed by `path`. No I/O happens until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Acquire the lock and hydrate from disk if not yet loaded.
    fn lock_loaded(&self) -> Result<MutexGuard<'_, Inner>> {
        let mut guard = self.lock()?;
        if !guard.loaded {
            self.hydrate(&mut guard);
        }
        Ok(guard)
    }

    /// Read the backing file into `inner`, falling back to an empty map on
    /// a missing or unreadable file. Keeping the pipeline operational wins
    /// over strictness here; corruption is logged so the resulting
    /// delete-and-reupload churn is diagnosable.
    fn hydrate(&self, inner: &mut Inner) {
        inner.entries.clear();
        inner.loaded = true;

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "mapping file absent; starting empty");
                return;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read mapping file; starting empty");
                return;
            }
        };

        match serde_json::from_str::<BTreeMap<String, MappingValue>>(&raw) {
            Ok(entries) => {
                inner.entries = entries;
                debug!(
                    path = %self.path.display(),
                    count = inner.entries.len(),
                    "mapping store hydrated"
                );
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "mapping file corrupt; starting empty");
            }
        }
    }

    /// Hydrate from disk. `reset` forces a fresh read, discarding any
    /// in-memory state.
    pub fn load(&self, reset: bool) -> Result<()> {
        let mut guard = self.lock()?;
        if !guard.loaded || reset {
            self.hydrate(&mut guard);
        }
        Ok(())
    }

    /// Strict accessor: returns the structured entry for `key`, treating
    /// legacy scalar values as absent.
    pub fn get(&self, key: &str) -> Result<Option<MappingEntry>> {
        let guard = self.lock_loaded()?;
        Ok(match guard.entries.get(key) {
            Some(MappingValue::Entry(entry)) => Some(entry.clone()),
            Some(MappingValue::Legacy(_)) | None => None,
        })
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: &str, entry: MappingEntry, auto_persist: bool) -> Result<()> {
        let mut guard = self.lock_loaded()?;
        guard
            .entries
            .insert(key.to_string(), MappingValue::Entry(entry));
        if auto_persist {
            self.persist_locked(&guard)?;
        }
        Ok(())
    }

    /// Insert or replace several entries under one lock acquisition.
    pub fn put_many<I>(&self, pairs: I, auto_persist: bool) -> Result<()>
    where
        I: IntoIterator<Item = (String, MappingEntry)>,
    {
        let mut guard = self.lock_loaded()?;
        for (key, entry) in pairs {
            guard.entries.insert(key, MappingValue::Entry(entry));
        }
        if auto_persist {
            self.persist_locked(&guard)?;
        }
        Ok(())
    }

    /// Remove the entry for `key`, returning it if it had the structured
    /// shape. Removing a legacy value returns `None` but still drops it.
    pub fn delete(&self, key: &str, auto_persist: bool) -> Result<Option<MappingEntry>> {
        let mut guard = self.lock_loaded()?;
        let removed = match guard.entries.remove(key) {
            Some(MappingValue::Entry(entry)) => Some(entry),
            Some(MappingValue::Legacy(_)) | None => None,
        };
        if auto_persist {
            self.persist_locked(&guard)?;
        }
        Ok(removed)
    }

    /// Point-in-time copy of all structured entries, ordered by key.
    ///
    /// Iterating the returned vector is safe even if the store mutates
    /// concurrently. Legacy values are omitted.
    pub fn snapshot_items(&self) -> Result<Vec<(String, MappingEntry)>> {
        let guard = self.lock_loaded()?;
        Ok(guard
            .entries
            .iter()
            .filter_map(|(k, v)| match v {
                MappingValue::Entry(entry) => Some((k.clone(), entry.clone())),
                MappingValue::Legacy(_) => None,
            })
            .collect())
    }

    /// Point-in-time copy of every stored key, legacy values included.
    pub fn snapshot_keys(&self) -> Result<Vec<String>> {
        let guard = self.lock_loaded()?;
        Ok(guard.entries.keys().cloned().collect())
    }

    /// Number of stored values, legacy ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_loaded()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write the whole map to disk atomically (temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let guard = self.lock_loaded()?;
        self.persist_locked(&guard)
    }

    fn persist_locked(&self, inner: &Inner) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&inner.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}
