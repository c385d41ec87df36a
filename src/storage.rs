use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{LeaderboardError, LeaderboardResult};

/// Durable string key-value storage backing the posts cache.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()>;
    fn remove(&self, key: &str) -> LeaderboardResult<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileStorage {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()> {
        fs::create_dir_all(&self.dir)?;
        // Readers must never observe a partially written entry.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> LeaderboardResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

type SharedEntries = Arc<Mutex<HashMap<String, String>>>;

/// Process-local storage, for running without a cache directory and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: SharedEntries,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| LeaderboardError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LeaderboardError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> LeaderboardResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LeaderboardError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
