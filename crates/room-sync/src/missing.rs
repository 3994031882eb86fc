//! Registry of item ids the server reported as unknown.

use room_core::{DeltaOp, ItemId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Ids confirmed missing on the server. Operations targeting them are never
/// sent again. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct KnownMissing {
    ids: Arc<Mutex<HashSet<ItemId>>>,
}

impl KnownMissing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`. Returns `true` if it was not known before.
    pub fn insert(&self, id: ItemId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// True if `op` targets a known-missing item.
    pub fn blocks(&self, op: &DeltaOp) -> bool {
        op.target_id().is_some_and(|id| self.contains(id))
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
