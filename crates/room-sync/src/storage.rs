//! Durable buffering of the unflushed queue.
//!
//! The queue mirrors itself into a key/value slot on every mutation so a
//! reload (or crash) between staging and flushing loses nothing. Stores are
//! synchronous: persisting happens inside `stage()` before it returns.

use crate::error::SyncError;
use room_core::DeltaOp;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A synchronous key/value slot store.
pub trait DurableStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SyncError>;
    fn save(&self, key: &str, value: &str) -> Result<(), SyncError>;
    fn remove(&self, key: &str) -> Result<(), SyncError>;
}

// ─── In-memory store ─────────────────────────────────────────────────────

/// Process-local store. Survives queue re-creation, not process restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SyncError> {
        self.slots
            .lock()
            .map_err(|_| SyncError::Storage("memory store lock poisoned".into()))
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.slots()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.slots()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.slots()?.remove(key);
        Ok(())
    }
}

// ─── File store ──────────────────────────────────────────────────────────

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SyncError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl DurableStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written slot.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Queue (de)serialization ─────────────────────────────────────────────

/// Serialize `ops` into the slot. An empty queue clears the slot.
pub fn persist_queue<'a, I>(store: &dyn DurableStore, key: &str, ops: I) -> Result<(), SyncError>
where
    I: IntoIterator<Item = &'a DeltaOp>,
{
    let ops: Vec<&DeltaOp> = ops.into_iter().collect();
    if ops.is_empty() {
        return store.remove(key);
    }
    let json = serde_json::to_string(&ops)?;
    store.save(key, &json)
}

/// Read the queue back from the slot, discarding operations that reference
/// temporary ids. A corrupt slot is logged and treated as empty.
pub fn restore_queue<S: AsRef<str>>(
    store: &dyn DurableStore,
    key: &str,
    temp_prefixes: &[S],
) -> Result<Vec<DeltaOp>, SyncError> {
    let Some(json) = store.load(key)? else {
        return Ok(Vec::new());
    };
    let ops: Vec<DeltaOp> = match serde_json::from_str(&json) {
        Ok(ops) => ops,
        Err(e) => {
            log::warn!("discarding unreadable pending queue in '{key}': {e}");
            return Ok(Vec::new());
        }
    };

    let total = ops.len();
    let kept: Vec<DeltaOp> = ops
        .into_iter()
        .filter(|op| {
            op.target_id()
                .is_none_or(|id| !id.is_temporary(temp_prefixes))
        })
        .collect();
    if kept.len() < total {
        log::warn!(
            "dropped {} restored ops referencing temporary ids",
            total - kept.len()
        );
    }
    log::debug!("restored {} pending ops from '{key}'", kept.len());
    Ok(kept)
}
