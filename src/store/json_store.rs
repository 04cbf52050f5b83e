//! File-backed entity store with atomic replace semantics.
//!
//! Each entity is one pretty-printed JSON document; binary payloads (pixel
//! buffers, originals, thumbnails) are blobs under `blobs/`. Every write
//! goes to a `.tmp` sibling first and is renamed into place, so readers
//! never observe a torn document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt entity '{name}': {source}")]
    Corrupt {
        name: String,
        source: serde_json::Error,
    },

    #[error("invalid entity or blob name: {0}")]
    InvalidName(String),
}

/// Per-entity serialized read-modify-write on top of plain JSON files.
pub struct JsonStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonStore {
    /// Open (and create) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("blobs"))?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn entity_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn entity_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_name(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_name(name)?;
        Ok(self.root.join("blobs").join(name))
    }

    /// Read an entity. `Ok(None)` when it has never been written.
    pub async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.entity_path(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Read an entity, falling back to `T::default()` when absent.
    pub async fn read_or_default<T>(&self, name: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.read(name).await?.unwrap_or_default())
    }

    /// Replace an entity. Durable before return: temp file then rename.
    pub async fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let lock = self.entity_lock(name).await;
        let _guard = lock.lock().await;
        self.write_unlocked(name, value).await
    }

    async fn write_unlocked<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.entity_path(name)?;
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        atomic_write(&path, &bytes).await?;
        Ok(())
    }

    /// Atomic read-modify-write. The mutator runs on the current value (or
    /// `T::default()` for a fresh entity); the result is persisted and
    /// returned. Concurrent updates of the same entity serialize.
    pub async fn update<T, F>(&self, name: &str, mutate: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let lock = self.entity_lock(name).await;
        let _guard = lock.lock().await;
        let mut value: T = self.read(name).await?.unwrap_or_default();
        mutate(&mut value);
        self.write_unlocked(name, &value).await?;
        Ok(value)
    }

    /// Remove an entity document. Missing entities are not an error.
    pub async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let lock = self.entity_lock(name).await;
        let _guard = lock.lock().await;
        let path = self.entity_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write_blob(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.blob_path(name)?;
        atomic_write(&path, bytes).await?;
        Ok(())
    }

    pub async fn remove_blob(&self, name: &str) -> Result<(), StoreError> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn blob_exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.blob_path(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Entity and blob names stay flat: no separators, no traversal.
fn check_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        || name.starts_with('.')
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    // Appending keeps `x.bin` and `x.src` from sharing one temp file.
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
