//! Durable slot holding the serialized conversation list.
//!
//! One key, one JSON document. The file backend writes to a sibling temp
//! file and renames it over the target so a crash never leaves half a list.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted state exists but cannot be decoded.
    #[error("persisted state is corrupt: {reason}")]
    CorruptState { reason: String },
}

/// A single durable key holding the serialized conversation list.
pub trait StateStorage: Send + Sync {
    /// Read the stored document. `Ok(None)` when nothing was ever written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] for failures other than "not found".
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the write does not complete.
    fn write(&self, contents: &str) -> Result<(), StorageError>;
}

// =============================================================================
// JSON FILE
// =============================================================================

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStorage for JsonFileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local storage, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self { slot: Mutex::new(Some(contents.into())) }
    }

    /// Current stored document.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }
}

impl<S: StateStorage + ?Sized> StateStorage for std::sync::Arc<S> {
    fn read(&self) -> Result<Option<String>, StorageError> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        (**self).write(contents)
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
