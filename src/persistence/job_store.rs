use std::fs;
use std::path::Path;

use crate::domain::Job;

use super::root::{atomic_write, JobPaths};

/// Persists `job`'s metadata snapshot next to its checkpoint (spec.md §4.9).
/// This is the record the restart bootstrap scans for — the checkpoint alone
/// does not carry fields like `created_at_ms` or `output_subtitle_path`.
pub fn save_job(jobs_dir: &Path, job: &Job) -> anyhow::Result<()> {
    let paths = JobPaths::new(jobs_dir.join(&job.id));
    let bytes = serde_json::to_vec_pretty(job)?;
    atomic_write(&paths.job_file(), &bytes)?;
    Ok(())
}

/// Loads every `job.json` found directly under a job subdirectory of
/// `jobs_dir`. Unparseable or missing files are skipped rather than failing
/// the whole bootstrap (best-effort restart, spec.md §1 Non-goals).
pub fn load_all_jobs(jobs_dir: &Path) -> Vec<Job> {
    let entries = match fs::read_dir(jobs_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut jobs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let job_file = JobPaths::new(path).job_file();
        if let Ok(bytes) = fs::read(&job_file) {
            if let Ok(job) = serde_json::from_slice::<Job>(&bytes) {
                jobs.push(job);
            }
        }
    }
    jobs
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
    fn save_then_load_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new("job-1".into(), "in.mp4".into(), settings(), 1000);
        save_job(dir.path(), &job).unwrap();

        let loaded = load_all_jobs(dir.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "job-1");
    }

    #[test]
    fn load_all_jobs_on_missing_dir_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_all_jobs(&missing).is_empty());
    }

    #[test]
    fn load_all_jobs_skips_corrupt_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let job_dir = dir.path().join("job-2");
        fs::create_dir_all(&job_dir).unwrap();
        fs::write(job_dir.join("job.json"), b"not json").unwrap();
        assert!(load_all_jobs(dir.path()).is_empty());
    }
}
