//! In-process scene service.
//!
//! `MemoryBackend` implements `SceneApi` over `SceneDocument`s with the same
//! semantics the HTTP service has: a PATCH whose base version does not match
//! the document is rejected with 412, a batch naming an unknown item is
//! rejected with 404 `Item not found: <id>`. It also records every call and
//! can inject failures or park PATCH requests, which is what the queue tests
//! and the CLI replay mode drive it with.

use crate::api::{PatchItemsRequest, SceneApi, SnapshotInfo, SnapshotRequest, paths};
use crate::error::{ApiError, NOT_FOUND};
use async_trait::async_trait;
use room_core::{DeltaOp, SceneDocument, SceneId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Which endpoint a recorded call or an injected failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Patch,
    Version,
    Snapshot,
}

/// A request as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Patch {
        path: String,
        base_version: u64,
        body: PatchItemsRequest,
    },
    FetchVersion {
        path: String,
    },
    CreateSnapshot {
        path: String,
        body: SnapshotRequest,
    },
}

impl ApiCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ApiCall::Patch { .. } => Endpoint::Patch,
            ApiCall::FetchVersion { .. } => Endpoint::Version,
            ApiCall::CreateSnapshot { .. } => Endpoint::Snapshot,
        }
    }
}

#[derive(Default)]
struct BackendState {
    scenes: HashMap<SceneId, SceneDocument>,
    calls: Vec<ApiCall>,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    snapshots: Vec<SnapshotInfo>,
}

/// In-memory `SceneApi`.
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    /// `true` while PATCH requests are parked.
    held: watch::Sender<bool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            held: watch::Sender::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or replace a scene document.
    pub fn seed(&self, scene: SceneId, document: SceneDocument) {
        self.state().scenes.insert(scene, document);
    }

    pub fn document(&self, scene: &SceneId) -> Option<SceneDocument> {
        self.state().scenes.get(scene).cloned()
    }

    /// Simulate another collaborator saving: bump the document version.
    pub fn bump_version(&self, scene: &SceneId) -> Option<u64> {
        let mut state = self.state();
        let doc = state.scenes.get_mut(scene)?;
        doc.version += 1;
        Some(doc.version)
    }

    /// Fail the next request to `endpoint` with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.state()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    /// Park PATCH requests until `release()`. Parked requests are already
    /// visible in `calls()`; injected PATCH failures fire on release.
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// `(base_version, operations)` of every PATCH received, in order.
    pub fn patches(&self) -> Vec<(u64, Vec<DeltaOp>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                ApiCall::Patch {
                    base_version, body, ..
                } => Some((*base_version, body.operations.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<SnapshotInfo> {
        self.state().snapshots.clone()
    }

    fn record(&self, call: ApiCall) {
        self.state().calls.push(call);
    }

    /// Pop an injected failure for `endpoint`, if one is queued.
    fn take_failure(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        match self
            .state()
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Record the call and pop an injected failure for its endpoint.
    fn begin(&self, call: ApiCall) -> Result<(), ApiError> {
        let endpoint = call.endpoint();
        self.record(call);
        self.take_failure(endpoint)
    }
}

fn unknown_scene(scene: &SceneId) -> ApiError {
    ApiError::http(NOT_FOUND, format!("Scene '{scene}' does not exist"))
}

#[async_trait]
impl SceneApi for MemoryBackend {
    async fn patch_items(
        &self,
        scene: &SceneId,
        base_version: u64,
        ops: &[DeltaOp],
    ) -> Result<u64, ApiError> {
        self.record(ApiCall::Patch {
            path: paths::items_path(scene),
            base_version,
            body: PatchItemsRequest {
                operations: ops.to_vec(),
            },
        });

        let mut rx = self.held.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
        self.take_failure(Endpoint::Patch)?;

        let mut state = self.state();
        let doc = state
            .scenes
            .get_mut(scene)
            .ok_or_else(|| unknown_scene(scene))?;
        if doc.version != base_version {
            return Err(ApiError::conflict(format!(
                "Version conflict: document is at v{}, request based on v{base_version}",
                doc.version
            )));
        }
        doc.apply(ops)
            .map_err(|e| ApiError::http(NOT_FOUND, e.to_string()))
    }

    async fn fetch_version(&self, scene: &SceneId) -> Result<u64, ApiError> {
        self.begin(ApiCall::FetchVersion {
            path: paths::version_path(scene),
        })?;
        self.state()
            .scenes
            .get(scene)
            .map(|doc| doc.version)
            .ok_or_else(|| unknown_scene(scene))
    }

    async fn create_snapshot(
        &self,
        scene: &SceneId,
        label: &str,
    ) -> Result<SnapshotInfo, ApiError> {
        self.begin(ApiCall::CreateSnapshot {
            path: paths::snapshots_path(scene),
            body: SnapshotRequest {
                label: label.to_string(),
            },
        })?;
        let mut state = self.state();
        let version = state
            .scenes
            .get(scene)
            .map(|doc| doc.version)
            .ok_or_else(|| unknown_scene(scene))?;
        let info = SnapshotInfo {
            id: format!("snap-{}", state.snapshots.len() + 1),
            label: label.to_string(),
            version,
        };
        state.snapshots.push(info.clone());
        Ok(info)
    }
}
