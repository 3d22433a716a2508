//! Extension storage backend.
//!
//! Provides persistent key-value storage for extensions. Each extension gets
//! its own namespace backed by a JSON file under the host data directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use super::error::{ExtensionError, ExtensionResult};

/// Extension-specific key-value storage.
///
/// Data is cached in memory and written through to disk on every change.
pub struct ExtensionStorage {
    /// Extension identifier (for error messages).
    extension: String,
    /// Path to the storage file.
    storage_path: PathBuf,
    /// In-memory cache of stored values.
    cache: BTreeMap<String, Value>,
    /// Whether the cache has uncommitted changes.
    dirty: bool,
}

impl ExtensionStorage {
    /// Open the storage for `extension` in `storage_dir`.
    ///
    /// A missing or unreadable file starts out empty.
    pub fn open(extension: &str, storage_dir: PathBuf) -> Self {
        let storage_path = storage_dir.join("storage.json");

        let cache = match fs::read_to_string(&storage_path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(extension, error = %e, "discarding corrupt extension storage");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self {
            extension: extension.to_string(),
            storage_path,
            cache,
            dirty: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(key).cloned()
    }

    /// Set a value. The value is immediately written to disk.
    pub fn set(&mut self, key: &str, value: Value) -> ExtensionResult<()> {
        self.cache.insert(key.to_string(), value);
        self.dirty = true;
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> ExtensionResult<()> {
        if self.cache.remove(key).is_some() {
            self.dirty = true;
            self.flush()?;
        }
        Ok(())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub fn clear(&mut self) -> ExtensionResult<()> {
        self.cache.clear();
        self.dirty = true;
        self.flush()
    }

    /// Flush cached changes to disk.
    pub fn flush(&mut self) -> ExtensionResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }

        let contents = serde_json::to_string_pretty(&self.cache)?;
        fs::write(&self.storage_path, contents).map_err(|e| self.error(e))?;

        self.dirty = false;
        Ok(())
    }

    fn error(&self, e: std::io::Error) -> ExtensionError {
        ExtensionError::Storage {
            extension: self.extension.clone(),
            message: format!("{}: {}", self.storage_path.display(), e),
        }
    }
}

impl Drop for ExtensionStorage {
    fn drop(&mut self) {
        // Best-effort flush on drop
        let _ = self.flush();
    }
}
