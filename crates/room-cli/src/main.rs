//! room-sync: inspect and replay the scene delta-save queue.
//!
//! `pending` prints what an editor left in its durable buffer (after
//! discarding operations on temporary ids, exactly as a reload would).
//! `replay` pushes newline-delimited operations through a real queue against
//! an in-process scene service, so save behavior can be reproduced outside
//! the editor.

mod args;

use args::{Cli, Command, ReplayOptions};
use clap::Parser;
use room_core::{DEFAULT_TEMP_PREFIXES, DeltaOp, SaveState, SceneDocument};
use room_sync::storage::restore_queue;
use room_sync::{
    DeltaSaveQueue, DurableStore, FileStore, MemoryBackend, MemoryStore, SceneApi, SyncConfig,
};
use std::io::BufRead;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Bad arguments exit with status 2 (clap's usage error).
    let cli = Cli::parse();

    let result = match cli.command {
        // ── Inspect a durable buffer ─────────────────────────────────────
        Command::Pending { store, key } => pending(&store, &key),

        // ── Replay stdin through a queue ─────────────────────────────────
        Command::Replay(opts) => {
            let stdin = std::io::stdin();
            replay(opts, stdin.lock()).await
        }
    };

    match result {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("room-sync: {e}");
            std::process::exit(1);
        }
    }
}

fn pending(dir: &std::path::Path, key: &str) -> Result<String, String> {
    let store = FileStore::open(dir).map_err(|e| e.to_string())?;
    let ops = restore_queue(&store, key, DEFAULT_TEMP_PREFIXES).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&ops).map_err(|e| e.to_string())
}

/// Read one `DeltaOp` per line. Blank lines are skipped.
fn read_ops(input: impl BufRead) -> Result<Vec<DeltaOp>, String> {
    let mut ops = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line.map_err(|e| format!("reading stdin: {e}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let op = serde_json::from_str(line).map_err(|e| format!("line {}: {e}", n + 1))?;
        ops.push(op);
    }
    Ok(ops)
}

fn seed_document(opts: &ReplayOptions) -> Result<SceneDocument, String> {
    let Some(path) = &opts.document else {
        return Ok(SceneDocument::new(opts.version));
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("reading {}: {e}", path.display()))?;
    let mut doc: SceneDocument =
        serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))?;
    doc.version = opts.version;
    Ok(doc)
}

async fn replay(opts: ReplayOptions, input: impl BufRead) -> Result<String, String> {
    let ops = read_ops(input)?;

    let scene = opts.scene_id();
    let backend = Arc::new(MemoryBackend::new());
    backend.seed(scene.clone(), seed_document(&opts)?);

    let store: Arc<dyn DurableStore> = match &opts.store {
        Some(dir) => Arc::new(FileStore::open(dir).map_err(|e| e.to_string())?),
        None => Arc::new(MemoryStore::new()),
    };
    let config = SyncConfig::default().with_debounce(opts.debounce());
    let api: Arc<dyn SceneApi> = backend.clone();
    let queue = DeltaSaveQueue::new(api, store, config).map_err(|e| e.to_string())?;

    queue.set_scene_id(scene.clone(), opts.version);
    log::info!("replaying {} operations into {scene}", ops.len());
    for op in ops {
        queue.stage(op);
    }

    match &opts.snapshot {
        Some(label) => {
            let info = queue
                .create_snapshot(label)
                .await
                .map_err(|e| e.to_string())?;
            log::info!("snapshot {} at v{}", info.id, info.version);
        }
        None => queue.flush_all().await,
    }

    let state = queue.save_state();
    report(&state)?;
    serde_json::to_string_pretty(&state).map_err(|e| e.to_string())
}

fn report(state: &SaveState) -> Result<(), String> {
    match &state.save_error {
        Some(err) => Err(format!("save failed at v{}: {err}", state.current_version)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    fn options(version: u64) -> ReplayOptions {
        ReplayOptions {
            scene: "living-room".to_string(),
            version,
            document: None,
            store: None,
            debounce_ms: 10,
            snapshot: None,
        }
    }

    #[test]
    fn read_ops_skips_blank_lines() {
        let input = "\n{\"op\":\"update_props\",\"environment\":\"dusk\"}\n\n";
        let ops = read_ops(input.as_bytes()).unwrap();
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn read_ops_reports_line_number() {
        let input = "{\"op\":\"update_props\"}\nnot json\n";
        let err = read_ops(input.as_bytes()).unwrap_err();
        assert!(err.starts_with("line 2:"), "{err}");
    }

    #[tokio::test]
    async fn replay_saves_and_reports_version() {
        let input = "{\"op\":\"add_item\",\"assetId\":\"lamp-arc\"}\n\
                     {\"op\":\"update_props\",\"environment\":\"dusk\"}\n";
        let out = replay(options(4), input.as_bytes()).await.unwrap();
        let state: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(state["currentVersion"], serde_json::json!(5));
        assert_eq!(state["isSaving"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn replay_with_snapshot() {
        let mut opts = options(2);
        opts.snapshot = Some("before-paint".into());
        let input = "{\"op\":\"update_props\",\"wall\":\"sage\"}\n";
        let out = replay(opts, input.as_bytes()).await.unwrap();
        assert!(out.contains("\"currentVersion\": 3"), "{out}");
    }

    #[test]
    fn report_fails_on_save_error() {
        let mut state = SaveState::new(3);
        assert_eq!(report(&state), Ok(()));
        state.save_error = Some("HTTP 500: boom".into());
        assert_eq!(
            report(&state),
            Err("save failed at v3: HTTP 500: boom".to_string())
        );
    }
}
