use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes `contents` atomically: write to a sibling temp file, `fsync`, then
/// `rename` over the destination. Grounded directly on the teacher's
/// `persist_queue_state_inner` (`engine/state_persist.rs`). On any write or
/// rename failure the temp file is removed rather than left behind.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    let write_result = (|| -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&tmp_path)?;
        file.sync_all().ok();
        fs::write(&tmp_path, contents)?;
        let file = fs::File::open(&tmp_path)?;
        file.sync_all().ok();
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

/// Ensures the persistence root (and `jobs/`) exist and are writable at
/// startup (spec.md §4.9).
pub fn ensure_root(root: &Path) -> io::Result<()> {
    fs::create_dir_all(root.join("jobs"))?;
    let probe = root.join(".write_probe");
    fs::write(&probe, b"ok")?;
    fs::remove_file(&probe)?;
    Ok(())
}

/// Per-job directory layout (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub dir: PathBuf,
}

impl JobPaths {
    pub fn new(job_dir: PathBuf) -> Self {
        JobPaths { dir: job_dir }
    }

    pub fn input(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("input.{ext}"))
    }

    pub fn audio_wav(&self) -> PathBuf {
        self.dir.join("audio.wav")
    }

    pub fn segment(&self, index: u32) -> PathBuf {
        self.dir.join("segments").join(format!("{index}.wav"))
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.dir.join("checkpoint.json")
    }

    pub fn job_file(&self) -> PathBuf {
        self.dir.join("job.json")
    }

    pub fn aligned(&self) -> PathBuf {
        self.dir.join("aligned.json")
    }

    pub fn output_srt(&self) -> PathBuf {
        self.dir.join("output.srt")
    }

    pub fn proxy_360p(&self) -> PathBuf {
        self.dir.join("proxy_360p.mp4")
    }

    pub fn proxy_720p(&self) -> PathBuf {
        self.dir.join("proxy_720p.mp4")
    }

    pub fn peaks(&self) -> PathBuf {
        self.dir.join("peaks.json")
    }

    pub fn thumbs_jpg(&self) -> PathBuf {
        self.dir.join("thumbs.jpg")
    }

    pub fn thumbs_json(&self) -> PathBuf {
        self.dir.join("thumbs.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_destination_and_no_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let tmp = dir.path().join("state.json.tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn atomic_write_overwrites_existing_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn ensure_root_creates_jobs_subdir() {
        let dir = tempfile::tempdir().unwrap();
        ensure_root(dir.path()).unwrap();
        assert!(dir.path().join("jobs").is_dir());
    }

    #[test]
    fn job_paths_nest_segments_under_segments_dir() {
        let paths = JobPaths::new(PathBuf::from("/root/jobs/abc"));
        assert_eq!(paths.segment(3), PathBuf::from("/root/jobs/abc/segments/3.wav"));
        assert_eq!(paths.checkpoint(), PathBuf::from("/root/jobs/abc/checkpoint.json"));
    }
}
