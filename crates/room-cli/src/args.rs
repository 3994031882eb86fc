//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use room_core::SceneId;
use room_sync::config::{DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DEBOUNCE_MS: u64 = DEFAULT_DEBOUNCE.as_millis() as u64;

#[derive(Debug, Parser)]
#[clap(name = "room-sync", version, about = "Inspect and replay the scene delta-save queue")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the operations buffered in a durable store
    Pending {
        /// Durable store directory
        #[clap(long, value_parser)]
        store: PathBuf,
        /// Storage slot holding the buffer
        #[clap(long, value_parser, default_value = DEFAULT_STORAGE_KEY)]
        key: String,
    },
    /// Stage one JSON delta operation per stdin line and save them
    Replay(ReplayOptions),
}

#[derive(Debug, Clone, Args)]
pub struct ReplayOptions {
    /// Scene id
    #[clap(value_parser)]
    pub scene: String,
    /// Server document version to start from
    #[clap(long, value_parser, default_value_t = 1)]
    pub version: u64,
    /// Scene document (JSON) to seed the in-process service with
    #[clap(long, value_parser)]
    pub document: Option<PathBuf>,
    /// Durable store directory. In-memory when absent
    #[clap(long, value_parser)]
    pub store: Option<PathBuf>,
    #[clap(long = "debounce-ms", value_parser, default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,
    /// Create a named snapshot after saving
    #[clap(long, value_parser)]
    pub snapshot: Option<String>,
}

impl ReplayOptions {
    pub fn scene_id(&self) -> SceneId {
        SceneId::new(self.scene.as_str())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
