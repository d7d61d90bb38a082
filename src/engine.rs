//! Process-wide bootstrap: wires persistence, the event bus, the model and
//! media supervisors, the job queue, and the single pipeline worker thread
//! into one `AppState` the HTTP surface serves from. Grounded in the
//! teacher's `TranscodingEngine::new()` + `spawn_worker` shape
//! (`transcoding/engine.rs`), generalized from an ffmpeg transcode queue to
//! the fixed subtitle pipeline stage machine.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::backends::{CopySeparator, FfmpegArtifactGenerator, FfmpegTranscoder, PassthroughAligner, StubRecognizer};
use crate::circuit_engine::CircuitEngineConfig;
use crate::config::Config;
use crate::domain::{JobStatus, SentenceSplitConfig};
use crate::events::EventBus;
use crate::http::{router, AppState};
use crate::media_supervisor::MediaSupervisor;
use crate::models::{HardwareProfile, ModelSupervisor, NoopLoader};
use crate::persistence::{ensure_root, load_all_jobs, load_queue_state, CheckpointStore, JobPaths};
use crate::pipeline::{PipelineContext, PipelineRunner};
use crate::queue::JobQueue;
use crate::shutdown::ShutdownSupervisor;

/// Selects a hardware profile conservatively. A real deployment would probe
/// the GPU; without that seam (spec.md §1 out of scope), default to the
/// most restrictive profile and let `--model-cache-dir`/env overrides steer
/// behavior instead.
fn detect_hardware_profile() -> HardwareProfile {
    HardwareProfile::NoGpu
}

pub struct Engine {
    pub state: AppState,
}

impl Engine {
    /// Runs the full startup sequence (spec.md §4.9 restart bootstrap):
    /// ensure the root layout exists, rehydrate the queue and job records
    /// from disk, construct every component, and spawn the background
    /// workers that keep them moving.
    pub fn bootstrap(config: Config) -> anyhow::Result<Self> {
        ensure_root(&config.root)?;
        let jobs_dir = config.jobs_dir();
        std::fs::create_dir_all(&jobs_dir)?;

        let events = Arc::new(EventBus::new());
        let checkpoints = Arc::new(CheckpointStore::new(jobs_dir.clone()));
        let queue = Arc::new(JobQueue::new(events.clone(), checkpoints.clone(), config.queue_state_path(), jobs_dir.clone()));

        let persisted_queue = load_queue_state(&config.queue_state_path());
        let jobs = load_all_jobs(&jobs_dir);
        info!(job_count = jobs.len(), "restoring jobs from disk");
        queue.restore(jobs, persisted_queue);

        let ffmpeg_path = "ffmpeg".to_string();
        let ffprobe_path = "ffprobe".to_string();

        let media_generator = Arc::new(FfmpegArtifactGenerator { ffmpeg_path: ffmpeg_path.clone() });
        let media = MediaSupervisor::new(config.max_media_workers, media_generator, events.clone());

        let hardware = detect_hardware_profile();
        let models = Arc::new(ModelSupervisor::new(hardware, Box::new(NoopLoader)));

        let shutdown = Arc::new(ShutdownSupervisor::new(Duration::from_secs(config.heartbeat_interval_secs)));

        let config = Arc::new(config);
        let state = AppState {
            config: config.clone(),
            queue: queue.clone(),
            events: events.clone(),
            checkpoints: checkpoints.clone(),
            media: media.clone(),
            models: models.clone(),
            shutdown: shutdown.clone(),
        };

        spawn_pipeline_worker(state.clone(), models, hardware, ffmpeg_path, ffprobe_path);
        spawn_heartbeat_task(events.clone());
        spawn_pending_media_recovery(state.clone());

        Ok(Engine { state })
    }

    pub fn router(&self) -> axum::Router {
        router(self.state.clone())
    }

    /// Resolves once it is safe to begin a graceful drain: either an
    /// explicit `/api/shutdown` call, or every connected client has gone
    /// quiet for longer than the configured grace window (spec.md §4.10).
    /// A startup grace period equal to the configured window is honored
    /// first so a freshly started server is not mistaken for an abandoned
    /// one before any client has had a chance to register.
    pub async fn shutdown_signal(&self) {
        tokio::time::sleep(self.state.shutdown_grace_window()).await;
        loop {
            let jobs_active = self.state.has_active_jobs();
            if self.state.shutdown.grace_window_elapsed(jobs_active) {
                info!("heartbeat grace window elapsed, draining");
                self.drain().await;
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Stops accepting new work, cancels any running job (its checkpoint is
    /// already up to date since the pipeline runner persists it after every
    /// segment), drops every event subscriber, and releases all resident
    /// model handles (spec.md §4.10).
    async fn drain(&self) {
        if let Some(running_id) = self.state.queue.queue_status().running {
            info!(job_id = %running_id, "cancelling running job for shutdown");
            let _ = self.state.queue.cancel(&running_id, false);
        }
        self.state.events.drain();
        self.state.models.drain();
    }
}

fn spawn_heartbeat_task(events: Arc<EventBus>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EventBus::heartbeat_interval());
        loop {
            ticker.tick().await;
            events.tick_heartbeat();
        }
    });
}

/// Jobs that were mid-flight at crash time still have a checkpoint but no
/// media derived yet; kick off generation for anything the restart found
/// already finished so the editor has something to show immediately.
fn spawn_pending_media_recovery(state: AppState) {
    tokio::spawn(async move {
        for job in state.queue.list() {
            if job.status == JobStatus::Finished {
                let paths = JobPaths::new(state.config.job_dir(&job.id));
                state.media.request_all(&job.id, std::path::PathBuf::from(job.input_media_path), paths);
            }
        }
    });
}

fn spawn_pipeline_worker(
    state: AppState,
    models: Arc<ModelSupervisor>,
    hardware: HardwareProfile,
    ffmpeg_path: String,
    ffprobe_path: String,
) {
    thread::Builder::new()
        .name("pipeline-worker".to_string())
        .spawn(move || {
            let transcoder = Arc::new(FfmpegTranscoder { ffmpeg_path: ffmpeg_path.clone(), ffprobe_path: ffprobe_path.clone() });
            let primary_recognizer = Arc::new(StubRecognizer { confidence: 0.92 });
            let fallback_recognizer = Arc::new(StubRecognizer { confidence: 0.98 });
            let aligner = Arc::new(PassthroughAligner);
            let separator = Arc::new(CopySeparator);

            loop {
                let (job_id, cancel, pause) = state.queue.take_next();
                let mut job = match state.queue.get(&job_id) {
                    Some(job) => job,
                    None => {
                        warn!(job_id, "worker popped a job id with no backing record, skipping");
                        continue;
                    }
                };

                let paths = JobPaths::new(state.config.job_dir(&job_id));
                let ctx = PipelineContext {
                    checkpoints: state.checkpoints.clone(),
                    events: state.events.clone(),
                    models: models.clone(),
                    hardware,
                    paths: paths.clone(),
                    transcoder: transcoder.clone(),
                    primary_recognizer: primary_recognizer.clone(),
                    fallback_recognizer: fallback_recognizer.clone(),
                    aligner: aligner.clone(),
                    separator: separator.clone(),
                    circuit_config: CircuitEngineConfig::default(),
                    sentence_config: SentenceSplitConfig::default(),
                    cancel,
                    pause,
                };

                let runner = PipelineRunner::new(ctx);
                if let Err(err) = runner.run(&mut job) {
                    error!(job_id = %job.id, error = %err, "pipeline run ended in error");
                    job.status = JobStatus::Failed;
                    job.last_error = Some(err.to_string());
                }

                if job.status == JobStatus::Finished {
                    job.output_subtitle_path = Some(paths.output_srt().display().to_string());
                    state.media.request_all(&job_id, std::path::PathBuf::from(job.input_media_path.clone()), paths);
                }

                state.queue.settle(&job_id, job);
            }
        })
        .expect("failed to spawn pipeline worker thread");
}

impl AppState {
    fn shutdown_grace_window(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_interval_secs)
    }

    fn has_active_jobs(&self) -> bool {
        let status = self.queue.queue_status();
        status.running.is_some() || !status.queue.is_empty()
    }
}
