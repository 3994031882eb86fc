//! Delta operations and save state for a room scene.
//!
//! A scene edit never ships the whole document. UI collaborators describe
//! each change as a `DeltaOp` (move a chair, recolor a sofa)
//! and the save queue sends those operations to the server in staging order.
//! The wire shape matches the scene API: operations are tagged by `"op"` and
//! item payload keys are camelCase.

use crate::id::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[x, y, z]` in scene units (meters) or radians for rotations.
pub type Vec3 = [f32; 3];

/// Free-form JSON object used for scene props and material overrides.
pub type FieldMap = Map<String, Value>;

// ─── Transform ───────────────────────────────────────────────────────────

/// Partial transform of a scene item. Absent fields mean "unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_euler: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation_euler.is_none() && self.scale.is_none()
    }

    /// Overlay the fields present in `other` onto `self`.
    pub fn merge(&mut self, other: &Transform) {
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.rotation_euler.is_some() {
            self.rotation_euler = other.rotation_euler;
        }
        if other.scale.is_some() {
            self.scale = other.scale;
        }
    }
}

// ─── Delta operations ────────────────────────────────────────────────────

/// One atomic mutation staged against a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeltaOp {
    /// Move, rotate, or scale an existing item.
    UpdateItem {
        id: ItemId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transform: Option<Transform>,
    },
    /// Insert a new instance of a catalog asset. The server mints the id.
    AddItem {
        #[serde(rename = "assetId")]
        asset_id: String,
        #[serde(
            rename = "categoryKey",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        category_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default)]
        transform: Transform,
    },
    RemoveItem {
        id: ItemId,
    },
    /// Patch scene-wide settings such as lighting or environment.
    UpdateProps {
        #[serde(flatten)]
        props: FieldMap,
    },
    /// Patch the per-item material override map.
    UpdateMaterial {
        id: ItemId,
        #[serde(rename = "materialOverrides")]
        material_overrides: FieldMap,
    },
}

impl DeltaOp {
    pub fn move_item(id: ItemId, position: Vec3) -> Self {
        DeltaOp::UpdateItem {
            id,
            transform: Some(Transform::at(position)),
        }
    }

    pub fn add_item(asset_id: impl Into<String>, transform: Transform) -> Self {
        DeltaOp::AddItem {
            asset_id: asset_id.into(),
            category_key: None,
            model: None,
            transform,
        }
    }

    pub fn remove_item(id: ItemId) -> Self {
        DeltaOp::RemoveItem { id }
    }

    pub fn update_props(props: FieldMap) -> Self {
        DeltaOp::UpdateProps { props }
    }

    pub fn update_material(id: ItemId, material_overrides: FieldMap) -> Self {
        DeltaOp::UpdateMaterial {
            id,
            material_overrides,
        }
    }

    /// The existing item this operation refers to, if any.
    /// `add_item` and `update_props` reference no item.
    pub fn target_id(&self) -> Option<ItemId> {
        match self {
            DeltaOp::UpdateItem { id, .. }
            | DeltaOp::RemoveItem { id }
            | DeltaOp::UpdateMaterial { id, .. } => Some(*id),
            DeltaOp::AddItem { .. } | DeltaOp::UpdateProps { .. } => None,
        }
    }

    /// Wire tag of the operation (`"update_item"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            DeltaOp::UpdateItem { .. } => "update_item",
            DeltaOp::AddItem { .. } => "add_item",
            DeltaOp::RemoveItem { .. } => "remove_item",
            DeltaOp::UpdateProps { .. } => "update_props",
            DeltaOp::UpdateMaterial { .. } => "update_material",
        }
    }
}

// ─── Save state ──────────────────────────────────────────────────────────

/// Save status of the active scene, published to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub is_saving: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
    /// Last known server document version; the optimistic-concurrency token.
    pub current_version: u64,
    pub is_offline: bool,
}

impl SaveState {
    pub fn new(current_version: u64) -> Self {
        Self {
            is_saving: false,
            last_saved: None,
            save_error: None,
            current_version,
            is_offline: false,
        }
    }
}

impl Default for SaveState {
    fn default() -> Self {
        Self::new(1)
    }
}
