//! Delta-save queue: local scene edits ↔ versioned server document.
//!
//! The queue is the only path scene edits take to the server:
//!
//! - **Staging**: UI collaborators call `stage()` for every edit. The
//!   operation is appended, mirrored into durable storage before `stage()`
//!   returns, and a trailing-edge debounce timer is restarted. A drag that
//!   stages every frame therefore produces one request once the pointer
//!   rests.
//!
//! - **Flushing**: `flush()` moves the whole queue into an in-flight batch
//!   and sends it in one PATCH carrying the last known document version.
//!   Edits staged while the request is out accumulate in a fresh queue.
//!   Only one flush is ever in flight.
//!
//! - **Reconciling**: a version conflict puts the batch back at the front
//!   and resyncs; a stale item reference drops the operations naming that
//!   item; any other failure puts the batch back and surfaces the error.
//!   Nothing is lost except operations the server confirmed it cannot apply.

use crate::api::{SceneApi, SnapshotInfo};
use crate::config::SyncConfig;
use crate::error::{ApiError, Failure, SyncError};
use crate::missing::KnownMissing;
use crate::storage::{DurableStore, persist_queue, restore_queue};
use chrono::Utc;
use room_core::{DeltaOp, ItemId, SaveState, SceneId};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// `save_error` shown while a version conflict is being resolved.
pub const CONFLICT_MESSAGE: &str = "Version conflict, syncing changes";

/// Mutable queue state. Only touched with the lock held, never across an
/// `.await`.
struct QueueState {
    scene_id: Option<SceneId>,
    /// Staged, not yet sent. Staging order.
    queue: Vec<DeltaOp>,
    /// Sent, not yet acknowledged. Kept for durable mirroring only.
    in_flight: Vec<DeltaOp>,
    /// A flush request is outstanding.
    pending: bool,
    online: bool,
    save: SaveState,
}

struct Inner {
    api: Arc<dyn SceneApi>,
    store: Arc<dyn DurableStore>,
    config: SyncConfig,
    missing: KnownMissing,
    state: Mutex<QueueState>,
    status: watch::Sender<SaveState>,
    /// Pending debounce timer, if any.
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the save queue of the active scene. Clones share the queue.
#[derive(Clone)]
pub struct DeltaSaveQueue {
    inner: Arc<Inner>,
}

impl DeltaSaveQueue {
    /// Create a queue, rehydrating any operations left in durable storage.
    pub fn new(
        api: Arc<dyn SceneApi>,
        store: Arc<dyn DurableStore>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        Self::with_known_missing(api, store, config, KnownMissing::new())
    }

    /// Like `new`, sharing a known-missing registry with other queues.
    pub fn with_known_missing(
        api: Arc<dyn SceneApi>,
        store: Arc<dyn DurableStore>,
        config: SyncConfig,
        missing: KnownMissing,
    ) -> Result<Self, SyncError> {
        let restored = restore_queue(
            store.as_ref(),
            &config.storage_key,
            &config.temp_id_prefixes,
        )?;
        // Write back so discarded temporary-id operations do not come back.
        persist_queue(store.as_ref(), &config.storage_key, &restored)?;
        if !restored.is_empty() {
            log::info!("restored {} unsaved scene edits", restored.len());
        }

        let save = SaveState::default();
        Ok(Self {
            inner: Arc::new(Inner {
                api,
                store,
                config,
                missing,
                state: Mutex::new(QueueState {
                    scene_id: None,
                    queue: restored,
                    in_flight: Vec::new(),
                    pending: false,
                    online: true,
                    save: save.clone(),
                }),
                status: watch::Sender::new(save),
                timer: Mutex::new(None),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror in-flight + queued operations into durable storage.
    ///
    /// In-flight operations stay in the buffer until acknowledged. A crash
    /// after the server applied a batch but before `on_saved` replays it on
    /// reload, so delivery is at-least-once and a replayed `add_item` can
    /// create a duplicate item.
    fn mirror(&self, st: &QueueState) {
        let ops = st.in_flight.iter().chain(st.queue.iter());
        if let Err(e) = persist_queue(self.inner.store.as_ref(), &self.inner.config.storage_key, ops)
        {
            log::error!("failed to persist pending scene edits: {e}");
        }
    }

    fn publish(&self, st: &QueueState) {
        self.inner.status.send_replace(st.save.clone());
    }

    // ─── Staging ─────────────────────────────────────────────────────────

    /// Append `op`, persist the queue, and restart the debounce timer.
    ///
    /// Operations naming an item the server already reported missing are
    /// suppressed.
    pub fn stage(&self, op: DeltaOp) {
        if self.inner.missing.blocks(&op) {
            log::warn!(
                "suppressing {} for {}: item no longer exists on the server",
                op.kind(),
                op.target_id().map(|id| id.to_string()).unwrap_or_default()
            );
            return;
        }

        {
            let mut st = self.state();
            log::debug!("staged {} ({} pending)", op.kind(), st.queue.len() + 1);
            st.queue.push(op);
            self.mirror(&st);
        }
        self.schedule_flush();
    }

    /// Restart the trailing-edge debounce timer.
    fn schedule_flush(&self) {
        let queue = self.clone();
        let debounce = self.inner.config.debounce;
        let Some(task) = spawn_detached(async move {
            tokio::time::sleep(debounce).await;
            // The flush runs as its own task: aborting this timer later must
            // never cancel a request that is already out.
            spawn_detached(async move { queue.flush().await });
        }) else {
            return;
        };

        let mut timer = self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.replace(task) {
            previous.abort();
        }
    }

    // ─── Flushing ────────────────────────────────────────────────────────

    /// Send every queued operation in one batch.
    ///
    /// No-op when the queue is empty, a flush is already in flight, or no
    /// scene is active. Never fails outward: the outcome lands in
    /// `save_state()`.
    pub async fn flush(&self) {
        let (scene, base_version, operations) = {
            let mut st = self.state();
            if st.queue.is_empty() || st.pending {
                return;
            }
            let Some(scene) = st.scene_id.clone() else {
                return;
            };
            st.pending = true;
            st.save.is_saving = true;
            st.save.save_error = None;
            let operations = std::mem::take(&mut st.queue);
            st.in_flight = operations.clone();
            self.publish(&st);
            (scene, st.save.current_version, operations)
        };

        log::debug!(
            "flushing {} ops to {scene} at v{base_version}",
            operations.len()
        );
        match self
            .inner
            .api
            .patch_items(&scene, base_version, &operations)
            .await
        {
            Ok(version) => self.on_saved(&scene, version, operations.len()),
            Err(err) => self.on_failed(&scene, err, operations),
        }
    }

    /// Release the in-flight slot and publish.
    fn finish(&self, st: &mut QueueState) {
        st.pending = false;
        st.in_flight.clear();
        st.save.is_saving = false;
        self.mirror(st);
        self.publish(st);
    }

    fn on_saved(&self, scene: &SceneId, version: u64, count: usize) {
        let reschedule = {
            let mut st = self.state();
            if st.scene_id.as_ref() == Some(scene) {
                st.save.current_version = version;
                st.save.last_saved = Some(Utc::now());
                st.save.save_error = None;
            }
            self.finish(&mut st);
            !st.queue.is_empty()
        };
        log::info!("saved {count} ops to {scene}, now at v{version}");
        if reschedule {
            self.schedule_flush();
        }
    }

    fn on_failed(&self, scene: &SceneId, err: ApiError, operations: Vec<DeltaOp>) {
        let count = operations.len();
        let failure = match err.classify() {
            // A 404 naming something this batch never referenced (the scene,
            // a route) is an ordinary failure.
            Failure::StaleReference(id) if !operations.iter().any(|op| targets(op, id)) => {
                Failure::Other
            }
            failure => failure,
        };
        match failure {
            Failure::Conflict => {
                {
                    let mut st = self.state();
                    st.queue.splice(0..0, operations);
                    st.save.save_error = Some(CONFLICT_MESSAGE.to_string());
                    self.finish(&mut st);
                }
                log::warn!("version conflict saving {scene} ({err}), {count} ops re-queued");
                if self.inner.config.auto_resync {
                    let queue = self.clone();
                    spawn_detached(async move {
                        if let Err(e) = queue.resync().await {
                            log::error!("resync after conflict failed: {e}");
                        }
                    });
                }
            }
            Failure::StaleReference(id) => {
                self.inner.missing.insert(id);
                let reschedule = {
                    let mut st = self.state();
                    let kept: Vec<DeltaOp> = operations
                        .into_iter()
                        .filter(|op| !targets(op, id))
                        .collect();
                    let dropped = count - kept.len();
                    st.queue.splice(0..0, kept);
                    st.queue.retain(|op| !targets(op, id));
                    self.finish(&mut st);
                    log::warn!("dropped {dropped} ops for {id}: the server has no such item");
                    !st.queue.is_empty()
                };
                if reschedule {
                    self.schedule_flush();
                }
            }
            Failure::Other => {
                {
                    let mut st = self.state();
                    st.queue.splice(0..0, operations);
                    st.save.save_error = Some(err.to_string());
                    if !st.online {
                        st.save.is_offline = true;
                    }
                    self.finish(&mut st);
                }
                log::error!("saving {scene} failed ({err}), {count} ops kept for retry");
            }
        }
    }

    /// Flush until the queue is drained, waiting out any in-flight request.
    /// Stops at the first failed attempt.
    pub async fn flush_all(&self) {
        loop {
            self.wait_idle().await;
            if self.state().queue.is_empty() {
                return;
            }
            self.flush().await;
            if self.state().save.save_error.is_some() {
                return;
            }
        }
    }

    async fn wait_idle(&self) {
        let mut rx = self.inner.status.subscribe();
        let _ = rx.wait_for(|save| !save.is_saving).await;
    }

    // ─── Scene lifecycle ─────────────────────────────────────────────────

    /// Make `id` the active scene at server version `version`.
    ///
    /// Replaces the save state; queued operations are kept and, if any are
    /// left (e.g. restored after a reload), a flush is scheduled.
    pub fn set_scene_id(&self, id: SceneId, version: u64) {
        let reschedule = {
            let mut st = self.state();
            log::info!("active scene is now {id} at v{version}");
            st.scene_id = Some(id);
            st.save = SaveState {
                is_saving: st.pending,
                is_offline: st.save.is_offline,
                ..SaveState::new(version)
            };
            self.publish(&st);
            !st.queue.is_empty()
        };
        if reschedule {
            self.schedule_flush();
        }
    }

    /// Explicit save: drain the queue, then create a named snapshot.
    ///
    /// Unlike `flush`, a failure is returned to the caller (and also left in
    /// `save_error`).
    pub async fn create_snapshot(&self, label: &str) -> Result<SnapshotInfo, SyncError> {
        let scene = self.scene_id().ok_or(SyncError::NoActiveScene)?;
        self.flush_all().await;

        match self.inner.api.create_snapshot(&scene, label).await {
            Ok(info) => {
                log::info!("created snapshot '{label}' of {scene} at v{}", info.version);
                Ok(info)
            }
            Err(err) => {
                let mut st = self.state();
                st.save.save_error = Some(format!("Snapshot failed: {err}"));
                self.publish(&st);
                log::error!("snapshot '{label}' of {scene} failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Adopt the server's current version after a conflict and retry.
    pub async fn resync(&self) -> Result<(), SyncError> {
        let scene = self.scene_id().ok_or(SyncError::NoActiveScene)?;
        match self.inner.api.fetch_version(&scene).await {
            Ok(version) => {
                let reschedule = {
                    let mut st = self.state();
                    if st.scene_id.as_ref() != Some(&scene) {
                        return Ok(());
                    }
                    st.save.current_version = version;
                    st.save.save_error = None;
                    self.publish(&st);
                    !st.queue.is_empty()
                };
                log::info!("resynced {scene} to v{version}");
                if reschedule {
                    self.schedule_flush();
                }
                Ok(())
            }
            Err(err) => {
                let mut st = self.state();
                st.save.save_error = Some(format!("Resync failed: {err}"));
                self.publish(&st);
                Err(err.into())
            }
        }
    }

    /// Network status signal. Coming back online flushes immediately.
    pub fn set_online(&self, online: bool) {
        let flush_now = {
            let mut st = self.state();
            st.online = online;
            st.save.is_offline = !online;
            self.publish(&st);
            online && !st.queue.is_empty()
        };
        log::info!("network is {}", if online { "online" } else { "offline" });
        if flush_now {
            let queue = self.clone();
            spawn_detached(async move { queue.flush().await });
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Operations staged and not yet sent.
    pub fn queue(&self) -> Vec<DeltaOp> {
        self.state().queue.clone()
    }

    /// Staged plus in-flight operations ("3 pending changes").
    pub fn pending_count(&self) -> usize {
        let st = self.state();
        st.queue.len() + st.in_flight.len()
    }

    pub fn save_state(&self) -> SaveState {
        self.state().save.clone()
    }

    pub fn scene_id(&self) -> Option<SceneId> {
        self.state().scene_id.clone()
    }

    /// Receiver notified on every save-state change.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.inner.status.subscribe()
    }

    pub fn known_missing(&self) -> &KnownMissing {
        &self.inner.missing
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }
}

fn targets(op: &DeltaOp, id: ItemId) -> bool {
    op.target_id() == Some(id)
}

/// Spawn onto the current Tokio runtime, if there is one.
fn spawn_detached<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            log::warn!("no async runtime, scheduled save skipped until the next trigger");
            None
        }
    }
}
