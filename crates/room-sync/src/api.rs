//! Network contract of the scene service.
//!
//! The queue never builds requests itself; it talks to a `SceneApi`. The
//! optimistic-concurrency token is an explicit `base_version` argument
//! rather than a header hidden in a client, so implementations decide how
//! to carry it (HTTP `If-Match`, a body field, ...).

use crate::error::ApiError;
use async_trait::async_trait;
use room_core::{DeltaOp, SceneId};
use serde::{Deserialize, Serialize};

/// Remote scene service.
#[async_trait]
pub trait SceneApi: Send + Sync {
    /// `PATCH /scenes/{scene}/items`: apply `ops` in order if the document
    /// is still at `base_version`. Returns the new document version.
    async fn patch_items(
        &self,
        scene: &SceneId,
        base_version: u64,
        ops: &[DeltaOp],
    ) -> Result<u64, ApiError>;

    /// `GET /scenes/{scene}/version`: the authoritative current version.
    async fn fetch_version(&self, scene: &SceneId) -> Result<u64, ApiError>;

    /// `POST /scenes/{scene}/snapshots`: create a named snapshot.
    async fn create_snapshot(&self, scene: &SceneId, label: &str)
    -> Result<SnapshotInfo, ApiError>;
}

// ─── Wire bodies ─────────────────────────────────────────────────────────

/// Body of `PATCH /scenes/{scene}/items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchItemsRequest {
    pub operations: Vec<DeltaOp>,
}

/// Body of `POST /scenes/{scene}/snapshots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub id: String,
    pub label: String,
    pub version: u64,
}

// ─── Endpoint paths ──────────────────────────────────────────────────────

pub mod paths {
    use room_core::SceneId;

    pub fn items_path(scene: &SceneId) -> String {
        format!("/scenes/{scene}/items")
    }

    pub fn version_path(scene: &SceneId) -> String {
        format!("/scenes/{scene}/version")
    }

    pub fn snapshots_path(scene: &SceneId) -> String {
        format!("/scenes/{scene}/snapshots")
    }
}
