use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::domain::{ArtifactKind, ArtifactState, EventChannel, EventKind, MediaArtifacts, SignalKind};
use crate::events::EventBus;
use crate::persistence::JobPaths;
use crate::sync_ext::MutexExt;

use super::generator::ArtifactGenerator;

struct Task {
    job_id: String,
    kind: ArtifactKind,
    input_media_path: PathBuf,
    paths: JobPaths,
}

fn terminal_signal(kind: ArtifactKind) -> Option<SignalKind> {
    match kind {
        ArtifactKind::PreviewProxy360p => Some(SignalKind::Preview360pComplete),
        ArtifactKind::Proxy720p => Some(SignalKind::Proxy720pComplete),
        _ => None,
    }
}

/// C7: generates derived editor media (audio peaks, proxies, thumbnails)
/// with a fixed small worker pool, in the documented priority order (spec.md
/// §4.7). Each (job, artifact) pair has its own `{absent -> generating ->
/// ready | failed}` state; generation is idempotent and safe to re-request.
pub struct MediaSupervisor {
    states: Mutex<HashMap<(String, ArtifactKind), ArtifactState>>,
    sender: mpsc::Sender<Task>,
    events: Arc<EventBus>,
}

impl MediaSupervisor {
    pub fn new(worker_count: usize, generator: Arc<dyn ArtifactGenerator>, events: Arc<EventBus>) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let supervisor = Arc::new(MediaSupervisor { states: Mutex::new(HashMap::new()), sender, events });

        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let generator = generator.clone();
            let supervisor = supervisor.clone();
            thread::spawn(move || loop {
                let task = {
                    let receiver = receiver.lock_unpoisoned();
                    receiver.recv()
                };
                match task {
                    Ok(task) => supervisor.run_task(generator.as_ref(), task),
                    Err(_) => break,
                }
            });
        }
        supervisor
    }

    fn set_state(&self, job_id: &str, kind: ArtifactKind, state: ArtifactState) {
        let mut states = self.states.lock_unpoisoned();
        states.insert((job_id.to_string(), kind), state);
    }

    fn publish(&self, job_id: &str, kind: EventKind) {
        self.events.publish(EventChannel::Job { job_id: job_id.to_string() }, kind.clone());
        self.events.publish(EventChannel::Global, kind);
    }

    fn run_task(&self, generator: &dyn ArtifactGenerator, task: Task) {
        match generator.generate(task.kind, &task.input_media_path, &task.paths) {
            Ok(()) => {
                self.set_state(&task.job_id, task.kind, ArtifactState::ready());
                self.publish(
                    &task.job_id,
                    EventKind::JobProgress {
                        job_id: Some(task.job_id.clone()),
                        phase: crate::domain::JobPhase::Complete,
                        phase_percent: 100.0,
                        overall_percent: 100.0,
                        processed: None,
                        total: None,
                        artifact: Some(task.kind),
                    },
                );
                if let Some(signal) = terminal_signal(task.kind) {
                    self.publish(&task.job_id, EventKind::Signal { job_id: Some(task.job_id.clone()), signal });
                }
            }
            Err(err) => {
                self.set_state(
                    &task.job_id,
                    task.kind,
                    ArtifactState { exists: false, generating: false, progress: 0.0, last_error: Some(err.to_string()) },
                );
            }
        }
    }

    /// Enqueues every artifact kind for `job_id` in priority order (spec.md
    /// §4.7). Re-requesting an artifact that is already `ready` or
    /// `generating` is harmless — the worker overwrites its own state with
    /// an equivalent result.
    pub fn request_all(&self, job_id: &str, input_media_path: PathBuf, paths: JobPaths) {
        for kind in ArtifactKind::GENERATION_ORDER {
            self.request(job_id, kind, input_media_path.clone(), paths.clone());
        }
    }

    /// Enqueues a single artifact kind, e.g. for an on-demand
    /// "generate-preview" request that should not pay for the whole
    /// priority-ordered set.
    pub fn request(&self, job_id: &str, kind: ArtifactKind, input_media_path: PathBuf, paths: JobPaths) {
        self.set_state(job_id, kind, ArtifactState { exists: false, generating: true, progress: 0.0, last_error: None });
        let _ = self.sender.send(Task { job_id: job_id.to_string(), kind, input_media_path, paths });
    }

    pub fn state(&self, job_id: &str, kind: ArtifactKind) -> ArtifactState {
        let states = self.states.lock_unpoisoned();
        states.get(&(job_id.to_string(), kind)).cloned().unwrap_or_default()
    }

    pub fn artifacts(&self, job_id: &str) -> MediaArtifacts {
        let states = self.states.lock_unpoisoned();
        let mut artifacts = MediaArtifacts::default();
        for kind in ArtifactKind::GENERATION_ORDER {
            if let Some(state) = states.get(&(job_id.to_string(), kind)) {
                artifacts.set_state(kind, state.clone());
            }
        }
        artifacts
    }

    /// Highest-tier ready artifact's URL-shaped path, fallback order
    /// `720p -> 360p -> source` (spec.md §4.7).
    pub fn best_available_url(&self, job_id: &str, paths: &JobPaths) -> PathBuf {
        match self.artifacts(job_id).best_available() {
            ArtifactKind::Proxy720p => paths.proxy_720p(),
            ArtifactKind::PreviewProxy360p => paths.proxy_360p(),
            _ => paths.dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
    }

    impl ArtifactGenerator for CountingGenerator {
        fn generate(&self, _kind: ArtifactKind, _input: &std::path::Path, _paths: &JobPaths) -> Result<(), crate::error::AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_until_ready(supervisor: &MediaSupervisor, job_id: &str, kind: ArtifactKind) {
        for _ in 0..200 {
            if supervisor.state(job_id, kind).exists {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("artifact {kind:?} never became ready");
    }

    #[test]
    fn request_all_generates_every_artifact_kind() {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = Arc::new(CountingGenerator { calls: calls.clone() });
        let events = Arc::new(EventBus::new());
        let supervisor = MediaSupervisor::new(2, generator, events);
        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(dir.path().to_path_buf());

        supervisor.request_all("job-1", PathBuf::from("input.mp4"), paths);
        wait_until_ready(&supervisor, "job-1", ArtifactKind::Proxy720p);
        assert_eq!(calls.load(Ordering::SeqCst), ArtifactKind::GENERATION_ORDER.len());
    }

    #[test]
    fn best_available_falls_back_to_source_before_anything_is_ready() {
        let generator = Arc::new(CountingGenerator { calls: Arc::new(AtomicUsize::new(0)) });
        let events = Arc::new(EventBus::new());
        let supervisor = MediaSupervisor::new(1, generator, events);
        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(dir.path().to_path_buf());
        assert_eq!(supervisor.best_available_url("job-2", &paths), paths.dir);
    }
}
