//! Small JSON key/value store for state that survives restarts.
//!
//! Only the login and the display mode live here; the cache and the
//! tracker are memory only.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const USER_KEY: &str = "user";
pub const LOGIN_EXPIRE_KEY: &str = "loginExpire";
pub const MODE_KEY: &str = "mode";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl LocalStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let values = load(&path)?.unwrap_or_default();
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed read. A value of the wrong shape is an error, not `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        self.values
            .get(key)
            .cloned()
            .map(serde_json::from_value::<T>)
            .transpose()
            .map_err(PersistenceError::from)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), PersistenceError> {
        self.values
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Write the store back to disk.
    pub fn save(&self) -> Result<(), PersistenceError> {
        save(&self.path, &self.values)
    }
}

fn load(path: &Path) -> Result<Option<Map<String, Value>>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&contents)?))
}

fn save(path: &Path, values: &Map<String, Value>) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(values)?;
    std::fs::write(path, contents)?;
    Ok(())
}
