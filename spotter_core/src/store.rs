//! Local key-value persistence with file locking.
//!
//! Each logical slot (workout cache, analysis cache, settings) is a single
//! string-keyed JSON value. [`FileStore`] keeps one file per key with shared
//! locks for readers and atomic, exclusively locked replacement for writers.
//! [`CacheSlot`] adds typed access and swallows corrupt values.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Slot holding the cached workout dataset
pub const WORKOUT_CACHE_KEY: &str = "hevy_workouts_cache";

/// Slot holding the last coaching analysis
pub const ANALYSIS_CACHE_KEY: &str = "hevy_ai_analysis";

/// Slot holding user settings (credentials, philosophy, coach)
pub const SETTINGS_KEY: &str = "hevy-spotter-storage";

/// String-keyed store of raw string values
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store: one `<key>.json` file per slot under a directory
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        read?;

        tracing::debug!("Read slot {:?} from {:?}", key, path);
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        // Unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote slot {:?} to {:?}", key, path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed slot {:?}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, used by tests and ephemeral sessions
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots().remove(key);
        Ok(())
    }
}

/// Typed JSON view of one store slot
pub struct CacheSlot<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CacheSlot<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> CacheSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the slot
    ///
    /// Missing, unreadable, and corrupt values all come back as `None`;
    /// failures are logged, never returned.
    pub fn read(&self) -> Option<T> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Unable to read slot {:?}: {}. Treating as empty.", self.key, e);
                return None;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse slot {:?}: {}. Treating as empty.", self.key, e);
                None
            }
        }
    }

    /// Overwrite the slot
    pub fn write(&self, value: &T) -> Result<()> {
        // Compact JSON, same as the rest of local persistence
        let contents = serde_json::to_string(value)?;
        self.store.set(&self.key, &contents)
    }

    /// Remove the slot
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key)
    }
}
