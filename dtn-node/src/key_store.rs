//! Destination key store.
//!
//! Keys are raw bytes kept in memory behind a `ThreadLock` and persisted
//! one file per key. A file directly under the store path is keyed by its
//! file name; files one subdirectory down are keyed `dirname/filename`,
//! which is how registration-scoped keys are laid out. Files with an
//! extension are skipped on load.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::{ThreadLock, DEFAULT_TIMEOUT};

/// Key store error.
#[derive(Debug)]
pub enum KeyStoreError {
    Io(io::Error),
    /// Store lock not acquired within its timeout.
    LockTimeout,
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStoreError::Io(e) => write!(f, "Key store I/O error: {}", e),
            KeyStoreError::LockTimeout => write!(f, "Key store lock timed out"),
        }
    }
}

impl std::error::Error for KeyStoreError {}

impl From<io::Error> for KeyStoreError {
    fn from(e: io::Error) -> Self {
        KeyStoreError::Io(e)
    }
}

/// Key store configuration.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    pub path: PathBuf,
    pub lock_timeout: Duration,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        KeyStoreConfig {
            path: PathBuf::from("/etc/opendtn/keys"),
            lock_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Concurrently-accessed key material store.
pub struct KeyStore {
    config: KeyStoreConfig,
    keys: ThreadLock<HashMap<String, Vec<u8>>>,
}

impl KeyStore {
    /// Build the store and attempt an initial load. Like the routing
    /// table, a failed initial load leaves an empty, usable store.
    pub fn create(config: KeyStoreConfig) -> Self {
        let store = KeyStore {
            keys: ThreadLock::new(HashMap::new(), config.lock_timeout),
            config,
        };
        if let Err(e) = store.load(None) {
            log::warn!("Key store: initial load failed: {}", e);
        }
        store
    }

    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// Reload all keys from `path` (or the configured directory). The
    /// directory is read fully before the in-memory map is swapped.
    /// Returns the number of keys loaded.
    pub fn load(&self, path: Option<&Path>) -> Result<usize, KeyStoreError> {
        let dir = path.unwrap_or(&self.config.path);
        let loaded = read_key_dir(dir)?;
        let count = loaded.len();

        let mut keys = self.keys.try_lock().ok_or(KeyStoreError::LockTimeout)?;
        *keys = loaded;
        drop(keys);

        log::debug!("Key store: loaded {} keys from {}", count, dir.display());
        Ok(count)
    }

    /// Write every key to `path` (or the configured directory), creating
    /// subdirectories for scoped (`dirname/filename`) keys. The first
    /// write failure aborts; files already written remain.
    pub fn save(&self, path: Option<&Path>) -> Result<(), KeyStoreError> {
        let keys = self.keys.try_lock().ok_or(KeyStoreError::LockTimeout)?;

        let dir = match path {
            Some(p) => {
                fs::create_dir_all(p)?;
                p
            }
            None => self.config.path.as_path(),
        };

        for (name, bytes) in keys.iter() {
            let file = dir.join(name);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file, bytes)?;
        }
        Ok(())
    }

    /// Fetch a copy of the key bytes, or None for an unknown key.
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        let keys = self.keys.try_lock().ok_or(KeyStoreError::LockTimeout)?;
        Ok(keys.get(name).cloned())
    }

    /// Insert or replace a key, taking ownership of the bytes.
    pub fn set(&self, name: &str, bytes: Vec<u8>) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.try_lock().ok_or(KeyStoreError::LockTimeout)?;
        keys.insert(name.to_string(), bytes);
        Ok(())
    }

    pub fn len(&self) -> Result<usize, KeyStoreError> {
        let keys = self.keys.try_lock().ok_or(KeyStoreError::LockTimeout)?;
        Ok(keys.len())
    }

    pub fn is_empty(&self) -> Result<bool, KeyStoreError> {
        Ok(self.len()? == 0)
    }
}

/// True for plain files without an extension.
fn is_key_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_none()
}

/// Read the key layout: extensionless files at the top level, plus one
/// level of subdirectories whose files become `dirname/filename` keys.
fn read_key_dir(dir: &Path) -> Result<HashMap<String, Vec<u8>>, KeyStoreError> {
    let mut keys = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if is_key_file(&path) {
            keys.insert(name, fs::read(&path)?);
        } else if path.is_dir() {
            for sub in fs::read_dir(&path)? {
                let sub_path = sub?.path();
                if !is_key_file(&sub_path) {
                    continue;
                }
                if let Some(file_name) = sub_path.file_name().and_then(|n| n.to_str()) {
                    keys.insert(format!("{}/{}", name, file_name), fs::read(&sub_path)?);
                }
            }
        }
    }
    Ok(keys)
}
