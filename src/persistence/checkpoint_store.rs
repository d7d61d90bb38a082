use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Checkpoint;
use crate::sync_ext::MutexExt;

use super::root::atomic_write;

/// Result of a checkpoint load (spec.md §4.1: `not_found` vs a parsed
/// snapshot vs `corrupt`, which must never be silently overwritten).
pub enum CheckpointLoadResult {
    NotFound,
    Loaded(Checkpoint),
    Corrupt { quarantined_path: PathBuf },
}

/// C1: atomic read/write of per-job checkpoint journals. Concurrent writers
/// are serialized per job id; concurrent readers are allowed (spec.md §4.1).
pub struct CheckpointStore {
    jobs_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckpointStore {
    pub fn new(jobs_dir: PathBuf) -> Self {
        CheckpointStore { jobs_dir, locks: Mutex::new(HashMap::new()) }
    }

    fn lock_for(&self, job_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock_unpoisoned();
        locks.entry(job_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn checkpoint_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(job_id).join("checkpoint.json")
    }

    /// Loads the checkpoint for `job_id`. A file that fails to parse is
    /// quarantined (renamed aside) rather than silently overwritten on the
    /// next save — the teacher's own `load_persisted_queue_state` only logs
    /// and returns `None` on a parse error; spec.md §4.1 requires preserving
    /// the corrupt file for inspection, so that behavior is added here.
    pub fn load(&self, job_id: &str) -> CheckpointLoadResult {
        let path = self.checkpoint_path(job_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return CheckpointLoadResult::NotFound,
        };
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) => CheckpointLoadResult::Loaded(checkpoint),
            Err(_) => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or(0);
                let quarantined_path = path.with_file_name(format!("checkpoint.json.corrupt-{millis}"));
                let _ = fs::rename(&path, &quarantined_path);
                CheckpointLoadResult::Corrupt { quarantined_path }
            }
        }
    }

    /// Writes `checkpoint` for its own job id, atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        let guard = self.lock_for(&checkpoint.job_id);
        let _held = guard.lock_unpoisoned();
        let path = self.checkpoint_path(&checkpoint.job_id);
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        atomic_write(&path, &bytes)?;
        Ok(())
    }

    /// Implemented as load+mutate+save, serialized per job id (spec.md §4.1).
    pub fn append_fragment(
        &self,
        job_id: &str,
        mutate: impl FnOnce(&mut Checkpoint),
    ) -> anyhow::Result<()> {
        let guard = self.lock_for(job_id);
        let _held = guard.lock_unpoisoned();
        let path = self.checkpoint_path(job_id);
        let bytes = fs::read(&path)?;
        let mut checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        mutate(&mut checkpoint);
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        atomic_write(&path, &bytes)?;
        Ok(())
    }

    pub fn purge(&self, job_id: &str) -> anyhow::Result<()> {
        let guard = self.lock_for(job_id);
        let _held = guard.lock_unpoisoned();
        let path = self.checkpoint_path(job_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineSettings, OnBreakPolicy, SeparationPolicy};

    fn settings() -> EngineSettings {
        EngineSettings {
            model_id: "primary".into(),
            compute_precision: "fp16".into(),
            device: "cpu".into(),
            batch_size: 1,
            word_level_timestamps: false,
            separation_policy: SeparationPolicy::Off,
            on_break_policy: OnBreakPolicy::Continue,
            problem_segment_suffix: crate::domain::default_problem_segment_suffix(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().to_path_buf());
        let checkpoint = Checkpoint::new("job-1".into(), 3, Vec::new(), settings());
        store.save(&checkpoint).unwrap();
        match store.load("job-1") {
            CheckpointLoadResult::Loaded(loaded) => assert_eq!(loaded, checkpoint),
            _ => panic!("expected Loaded"),
        }
    }

    #[test]
    fn load_missing_job_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load("nope"), CheckpointLoadResult::NotFound));
    }

    #[test]
    fn corrupt_checkpoint_is_quarantined_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let job_dir = dir.path().join("job-1");
        fs::create_dir_all(&job_dir).unwrap();
        fs::write(job_dir.join("checkpoint.json"), b"not json").unwrap();

        let store = CheckpointStore::new(dir.path().to_path_buf());
        match store.load("job-1") {
            CheckpointLoadResult::Corrupt { quarantined_path } => {
                assert!(quarantined_path.exists());
                assert!(!job_dir.join("checkpoint.json").exists());
            }
            _ => panic!("expected Corrupt"),
        }
    }

    #[test]
    fn purge_removes_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().to_path_buf());
        let checkpoint = Checkpoint::new("job-1".into(), 1, Vec::new(), settings());
        store.save(&checkpoint).unwrap();
        store.purge("job-1").unwrap();
        assert!(matches!(store.load("job-1"), CheckpointLoadResult::NotFound));
    }
}
