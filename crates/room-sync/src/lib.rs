pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod missing;
pub mod queue;
pub mod storage;

pub use api::{PatchItemsRequest, SceneApi, SnapshotInfo, SnapshotRequest};
pub use backend::{ApiCall, Endpoint, MemoryBackend};
pub use config::SyncConfig;
pub use error::{ApiError, Failure, SyncError};
pub use missing::KnownMissing;
pub use queue::{CONFLICT_MESSAGE, DeltaSaveQueue};
pub use storage::{DurableStore, FileStore, MemoryStore};

// Re-export the data model so collaborators only need this crate.
pub use room_core;
