// src/storage.rs
use crate::error::{StoreError, StoreResult};
use log;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Synchronous string key-value storage, the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            let msg = format!("Invalid storage key '{}'", key);
            log::error!("FileStorage: {}", msg);
            return Err(StoreError::FormatError(msg));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => {
                log::debug!("Read {} bytes from {:?}", contents.len(), path);
                Ok(Some(contents))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No stored value at {:?}", path);
                Ok(None)
            }
            Err(e) => {
                log::error!("Failed to read {:?}: {:?}", path, e);
                Err(StoreError::Io(e))
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                log::error!("Failed to create storage directory {:?}: {:?}", self.dir, e);
                StoreError::Io(e)
            })?;
            log::info!("Created storage directory: {:?}", self.dir);
        }

        // Write to a sibling file first so a failed write never truncates the old value.
        let tmp_path = path.with_extension("json.tmp");
        if let Err(e) = write_then_rename(&tmp_path, &path, value) {
            match fs::remove_file(&tmp_path) {
                Ok(()) => log::debug!("Removed leftover {:?}", tmp_path),
                Err(rm) if rm.kind() == ErrorKind::NotFound => {}
                Err(rm) => log::warn!("Failed to remove leftover {:?}: {:?}", tmp_path, rm),
            }
            return Err(StoreError::Io(e));
        }
        log::debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }
}

fn write_then_rename(tmp_path: &Path, path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)
        .map_err(|e| {
            log::error!("Failed to open file {:?} for writing: {:?}", tmp_path, e);
            e
        })?;
    file.write_all(value.as_bytes()).map_err(|e| {
        log::error!("Failed to write value to {:?}: {:?}", tmp_path, e);
        e
    })?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp_path, path).map_err(|e| {
        log::error!("Failed to move {:?} into place at {:?}: {:?}", tmp_path, path, e);
        e
    })
}

/// In-memory storage for tests; can be switched to reject writes.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: std::cell::RefCell<std::collections::HashMap<String, String>>,
    fail_writes: std::cell::Cell<bool>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = MemoryStorage::default();
        storage.values.borrow_mut().insert(key.to_string(), value.to_string());
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_writes.get() {
            let msg = format!("write to '{}' rejected", key);
            return Err(StoreError::Io(std::io::Error::new(ErrorKind::PermissionDenied, msg)));
        }
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
