//! Persisted quality level store.
//!
//! The controller restores the last-used level on activation and saves it on
//! deactivation. Stores are shared between controller instances through `Arc`.

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Key the quality level is stored under.
pub const QUALITY_LEVEL_KEY: &str = "quality_level";

/// Persisted-integer store.
pub trait LevelStore: Send + Sync {
    /// Stored level, or `default` when nothing was stored.
    fn persisted_level(&self, default: i32) -> i32;

    fn set_persisted_level(&self, level: i32);

    /// Make previously set values durable.
    fn flush(&self) -> Result<(), StoreError>;
}

/// Volatile store, used by tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryLevelStore {
    level: RwLock<Option<i32>>,
}

impl MemoryLevelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: i32) -> Self {
        Self {
            level: RwLock::new(Some(level)),
        }
    }

    pub fn stored(&self) -> Option<i32> {
        self.level.read().map(|l| *l).unwrap_or(None)
    }
}

impl LevelStore for MemoryLevelStore {
    fn persisted_level(&self, default: i32) -> i32 {
        self.stored().unwrap_or(default)
    }

    fn set_persisted_level(&self, level: i32) {
        if let Ok(mut stored) = self.level.write() {
            *stored = Some(level);
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// File-backed key/integer store written as a JSON object.
///
/// Values are held in memory and only reach disk on [`flush`](LevelStore::flush),
/// using a temp-file-and-rename write.
#[derive(Debug)]
pub struct JsonLevelStore {
    values: RwLock<BTreeMap<String, i32>>,
    path: PathBuf,
}

impl JsonLevelStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let values = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;

            serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            values: RwLock::new(values),
            path: path.to_path_buf(),
        })
    }

    /// Open the store, starting empty when the file is unreadable or corrupt.
    pub fn open_or_empty(path: &Path) -> Self {
        match Self::open(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Failed to load level store: {}, starting empty", e);
                Self {
                    values: RwLock::new(BTreeMap::new()),
                    path: path.to_path_buf(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the default store path (~/.local/share/adaptive-quality/prefs.json).
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("adaptive-quality")
            .join("prefs.json")
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).copied())
    }

    pub fn set(&self, key: &str, value: i32) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value);
        }
    }
}

impl LevelStore for JsonLevelStore {
    fn persisted_level(&self, default: i32) -> i32 {
        self.get(QUALITY_LEVEL_KEY).unwrap_or(default)
    }

    fn set_persisted_level(&self, level: i32) {
        self.set(QUALITY_LEVEL_KEY, level);
    }

    fn flush(&self) -> Result<(), StoreError> {
        let json = {
            let values = self.values.read().map_err(|_| StoreError::Corrupt {
                path: self.path.display().to_string(),
                reason: "lock poisoned".to_string(),
            })?;
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!("Flushed level store to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_default_and_set() {
        let store = MemoryLevelStore::new();
        assert_eq!(store.persisted_level(4), 4);

        store.set_persisted_level(2);
        assert_eq!(store.persisted_level(4), 2);
        assert_eq!(store.stored(), Some(2));
        assert!(store.flush().is_ok());
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonLevelStore::open(&dir.path().join("prefs.json")).unwrap();
        assert_eq!(store.persisted_level(3), 3);
    }

    #[test]
    fn test_json_store_requires_flush_to_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = JsonLevelStore::open(&path).unwrap();
        store.set_persisted_level(1);
        assert!(!path.exists());

        store.flush().unwrap();
        assert!(path.exists());

        let reopened = JsonLevelStore::open(&path).unwrap();
        assert_eq!(reopened.persisted_level(5), 1);
    }

    #[test]
    fn test_json_store_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"volume": 7}"#).unwrap();

        let store = JsonLevelStore::open(&path).unwrap();
        store.set_persisted_level(2);
        store.flush().unwrap();

        let reopened = JsonLevelStore::open(&path).unwrap();
        assert_eq!(reopened.get("volume"), Some(7));
        assert_eq!(reopened.get(QUALITY_LEVEL_KEY), Some(2));
    }

    #[test]
    fn test_json_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonLevelStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));

        let store = JsonLevelStore::open_or_empty(&path);
        assert_eq!(store.persisted_level(0), 0);
    }
}
