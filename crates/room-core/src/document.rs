//! Versioned scene document: the server-side view of a room.
//!
//! The document applies batches of `DeltaOp`s in order. A batch is atomic:
//! it either applies completely and bumps `version` by one, or fails on the
//! first operation that names an unknown item and leaves the document as it
//! was. The in-process backend and the tests use this as the authority the
//! save queue reconciles against.

use crate::id::ItemId;
use crate::model::{DeltaOp, FieldMap, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error applying a batch to a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The message format is what the scene API reports on a 404, and what
    /// the save queue parses the missing id back out of.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),
}

/// One placed item in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItem {
    pub id: ItemId,
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    pub material_overrides: FieldMap,
}

/// A scene document with a monotonically increasing version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub version: u64,
    #[serde(default)]
    pub items: BTreeMap<String, SceneItem>,
    #[serde(default)]
    pub props: FieldMap,
    #[serde(default = "first_item", rename = "nextItem")]
    next_item: u64,
}

fn first_item() -> u64 {
    1
}

impl SceneDocument {
    /// Create an empty document at the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            items: BTreeMap::new(),
            props: FieldMap::new(),
            next_item: first_item(),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&SceneItem> {
        self.items.get(id.as_str())
    }

    /// Insert an item under a caller-chosen id without bumping the version.
    /// Used to seed documents.
    pub fn insert(&mut self, id: ItemId, asset_id: impl Into<String>, transform: Transform) {
        self.items.insert(
            id.as_str().to_string(),
            SceneItem {
                id,
                asset_id: asset_id.into(),
                category_key: None,
                model: None,
                transform,
                material_overrides: FieldMap::new(),
            },
        );
    }

    /// Apply a batch atomically and return the new version.
    pub fn apply(&mut self, ops: &[DeltaOp]) -> Result<u64, ApplyError> {
        // Work on a copy so a failure halfway leaves `self` untouched.
        let mut next = self.clone();
        for op in ops {
            next.apply_one(op)?;
        }
        next.version += 1;
        *self = next;
        log::debug!("applied {} ops, document now at v{}", ops.len(), self.version);
        Ok(self.version)
    }

    fn apply_one(&mut self, op: &DeltaOp) -> Result<(), ApplyError> {
        match op {
            DeltaOp::UpdateItem { id, transform } => {
                let item = self.item_mut(*id)?;
                if let Some(t) = transform {
                    item.transform.merge(t);
                }
            }
            DeltaOp::AddItem {
                asset_id,
                category_key,
                model,
                transform,
            } => {
                let id = ItemId::intern(&format!("item-{}", self.next_item));
                self.next_item += 1;
                self.items.insert(
                    id.as_str().to_string(),
                    SceneItem {
                        id,
                        asset_id: asset_id.clone(),
                        category_key: category_key.clone(),
                        model: model.clone(),
                        transform: *transform,
                        material_overrides: FieldMap::new(),
                    },
                );
            }
            DeltaOp::RemoveItem { id } => {
                if self.items.remove(id.as_str()).is_none() {
                    return Err(ApplyError::ItemNotFound(*id));
                }
            }
            DeltaOp::UpdateProps { props } => merge_fields(&mut self.props, props),
            DeltaOp::UpdateMaterial {
                id,
                material_overrides,
            } => {
                let item = self.item_mut(*id)?;
                merge_fields(&mut item.material_overrides, material_overrides);
            }
        }
        Ok(())
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut SceneItem, ApplyError> {
        self.items
            .get_mut(id.as_str())
            .ok_or(ApplyError::ItemNotFound(id))
    }
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Shallow merge: `null` deletes a key, anything else overwrites it.
fn merge_fields(target: &mut FieldMap, patch: &FieldMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}
