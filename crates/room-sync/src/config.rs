//! Save-queue configuration.

use room_core::DEFAULT_TEMP_PREFIXES;
use std::time::Duration;

/// Default quiet period after the last staged operation before a flush.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Default durable-storage slot for the unflushed queue.
pub const DEFAULT_STORAGE_KEY: &str = "room-sync.pending-ops";

/// Configuration for `DeltaSaveQueue`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trailing-edge debounce window. Every `stage()` restarts it.
    /// Default: **400 ms**.
    pub debounce: Duration,

    /// Key of the durable slot the queue mirrors itself into.
    pub storage_key: String,

    /// Id prefixes that mark client-minted, unconfirmed items. Operations
    /// naming such ids are discarded when the queue is restored.
    pub temp_id_prefixes: Vec<String>,

    /// Fetch the server version and retry automatically after a version
    /// conflict. Default: **true**.
    pub auto_resync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            temp_id_prefixes: DEFAULT_TEMP_PREFIXES.iter().map(|p| p.to_string()).collect(),
            auto_resync: true,
        }
    }
}

impl SyncConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_temp_id_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.temp_id_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auto_resync(mut self, auto_resync: bool) -> Self {
        self.auto_resync = auto_resync;
        self
    }
}
