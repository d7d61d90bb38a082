use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::root::atomic_write;

/// Global queue-state file schema (spec.md §6 "Queue state schema").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QueueStateFile {
    pub queue: Vec<String>,
    pub running: Option<String>,
    pub paused: Vec<String>,
    pub interrupted_by: HashMap<String, String>,
}

pub fn save_queue_state(path: &Path, state: &QueueStateFile) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(state)?;
    atomic_write(path, &bytes)?;
    Ok(())
}

/// Returns `None` if the file is missing or unparseable — callers treat
/// that as "start with an empty queue" (best-effort journaling only,
/// spec.md §1 Non-goals).
pub fn load_queue_state(path: &Path) -> Option<QueueStateFile> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_state.json");
        let mut state = QueueStateFile::default();
        state.queue = vec!["a".into(), "b".into()];
        state.running = Some("a".into());
        state.interrupted_by.insert("c".into(), "a".into());

        save_queue_state(&path, &state).unwrap();
        let loaded = load_queue_state(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_state.json");
        assert!(load_queue_state(&path).is_none());
    }
}
