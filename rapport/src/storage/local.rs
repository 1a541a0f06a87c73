//! Local persistence for named collections
//!
//! Synchronous key/value storage of JSON documents on the device. Reads
//! never fail from the caller's point of view: missing or unreadable data
//! falls back to the caller's default, and malformed records are skipped
//! one at a time. Both are logged.

use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Raw key/value persistence
pub trait LocalStore: Send + Sync {
    /// Load the stored contents for `key`, `None` if nothing is stored
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the stored contents for `key`
    fn save(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read a collection, falling back to `default` on any problem
pub fn read_collection<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
    default: Vec<T>,
) -> Vec<T> {
    let contents = match store.load(key) {
        Ok(Some(contents)) => contents,
        Ok(None) => return default,
        Err(e) => {
            tracing::warn!("Failed to read local collection {}: {}", key, e);
            return default;
        }
    };

    let documents: Vec<Value> = match serde_json::from_str(&contents) {
        Ok(documents) => documents,
        Err(e) => {
            tracing::warn!("Malformed local collection {}, using default: {}", key, e);
            return default;
        }
    };

    // One bad record must not cost the rest of the collection
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value::<T>(document) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed record in local collection {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// Write a collection; failures are logged, never returned
pub fn write_collection<T: Serialize>(store: &dyn LocalStore, key: &str, items: &[T]) {
    let contents = match serde_json::to_string(items) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to serialize local collection {}: {}", key, e);
            return;
        }
    };

    if let Err(e) = store.save(key, &contents) {
        tracing::error!("Error saving local collection {}: {}", key, e);
    }
}

/// One JSON file per key under a root directory.
///
/// Example: key "contacts" is stored at "<root>/contacts.json"
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root directory if needed
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        tracing::info!("Local store initialized at: {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

impl LocalStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.get_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn save(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.get_path(key);
        fs::create_dir_all(&self.root)?;

        // Write to temp file first (atomic replace)
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(temp_path, &path)?;

        tracing::debug!("Wrote local collection {} ({} bytes)", key, contents.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.get_path(key);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, contents: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Keep keys to a single path component
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' => '_',
            c => c,
        })
        .collect()
}
