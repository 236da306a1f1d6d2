//! JSON-file state store for the agent registry and conversation log
//!
//! Every mutation is a read-modify-write of a whole collection, serialized
//! under an in-process write lock and committed by writing a scratch file
//! and renaming it over the original. A crash at any point leaves either the
//! old or the new file in place.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::schema::{self, AGENTS_FILE, CONVERSATIONS_FILE, REGISTRY_VERSION};
use super::types::{PersistedDialogue, RegistrySnapshot};

/// Error type for state store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt state file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Unsupported schema version {found} in {} (expected {expected})", path.display())]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to StateStore
pub type SharedStateStore = Arc<StateStore>;

/// Directory-backed store owning both durable collections
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
    agents_path: PathBuf,
    conversations_path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Open (creating if needed) the state directory
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            agents_path: dir.join(AGENTS_FILE),
            conversations_path: dir.join(CONVERSATIONS_FILE),
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStateStore {
        Arc::new(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn agents_path(&self) -> &Path {
        &self.agents_path
    }

    pub fn conversations_path(&self) -> &Path {
        &self.conversations_path
    }

    // =========================================================================
    // Agent registry
    // =========================================================================

    /// Load the registry; a missing file is an empty registry
    pub fn load_registry(&self) -> StoreResult<RegistrySnapshot> {
        let Some(snapshot) = read_json::<RegistrySnapshot>(&self.agents_path)? else {
            return Ok(RegistrySnapshot::default());
        };

        if snapshot.version != REGISTRY_VERSION {
            return Err(StoreError::VersionMismatch {
                path: self.agents_path.clone(),
                expected: REGISTRY_VERSION,
                found: snapshot.version,
            });
        }
        if let Some(reason) = schema::check_registry(&snapshot) {
            return Err(StoreError::Corrupt {
                path: self.agents_path.clone(),
                reason,
            });
        }
        Ok(snapshot)
    }

    /// Read-modify-write the registry under the write lock.
    ///
    /// Nothing is written when `mutate` fails.
    pub fn update_registry<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut RegistrySnapshot) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut snapshot = self.load_registry()?;
        let value = mutate(&mut snapshot)?;
        write_json_atomic(&self.agents_path, &snapshot)?;
        Ok(value)
    }

    /// Drop every registry entry by deleting the registry file
    pub fn clear_registry(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        match std::fs::remove_file(&self.agents_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.agents_path.clone(),
                source,
            }),
        }
    }

    // =========================================================================
    // Conversation log
    // =========================================================================

    /// Load the whole conversation log in append order
    pub fn load_conversations(&self) -> StoreResult<Vec<PersistedDialogue>> {
        Ok(read_json(&self.conversations_path)?.unwrap_or_default())
    }

    /// Append one dialogue, rewriting the log atomically.
    ///
    /// Returns the log length after the append.
    pub fn append_dialogue(&self, entry: &PersistedDialogue) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut log = self.load_conversations()?;
        log.push(entry.clone());
        write_json_atomic(&self.conversations_path, &log)?;
        Ok(log.len())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write to a scratch file, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let temp_path = schema::temp_path(path);

    std::fs::write(&temp_path, content).map_err(|source| StoreError::Io {
        path: temp_path.clone(),
        source,
    })?;
    std::fs::rename(&temp_path, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
