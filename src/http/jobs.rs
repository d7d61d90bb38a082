use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::domain::{EngineSettings, Job, JobStatus, OnBreakPolicy, SeparationPolicy};
use crate::error::{AppError, AppResult};
use crate::persistence::{CheckpointLoadResult, JobPaths};

use super::dto::{
    CancelQuery, CheckResumeResponse, CreateJobRequest, JobStatusResponse, PrioritizeQuery,
    ReorderRequest, SettingsRequest, StartRequest, StartResponse, UploadResponse,
};
use super::state::AppState;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn default_settings() -> EngineSettings {
    SettingsRequest {
        model_id: "primary".to_string(),
        compute_precision: "fp16".to_string(),
        device: "cpu".to_string(),
        batch_size: 1,
        word_level_timestamps: false,
        separation_policy: SeparationPolicy::Auto,
        on_break_policy: OnBreakPolicy::Continue,
        problem_segment_suffix: crate::domain::default_problem_segment_suffix(),
    }
    .into()
}

fn queue_position(state: &AppState, job_id: &str) -> Option<usize> {
    state.queue.queue_status().queue.iter().position(|id| id == job_id)
}

fn job_status_response(state: &AppState, job: Job) -> JobStatusResponse {
    let media = state.media.artifacts(&job.id);
    JobStatusResponse { job, media }
}

/// `POST /api/upload` — multipart upload; saves the file under the new job's
/// directory and creates the job record (not yet enqueued).
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Json<UploadResponse>> {
    let job_id = Uuid::new_v4().to_string();
    let paths = JobPaths::new(state.config.job_dir(&job_id));

    let mut filename = String::new();
    let mut saved = false;
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().unwrap_or("upload.bin").to_string();
        let ext = std::path::Path::new(&filename).extension().and_then(|e| e.to_str()).unwrap_or("bin").to_string();
        let bytes = field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?;
        std::fs::create_dir_all(&paths.dir)?;
        std::fs::write(paths.input(&ext), &bytes)?;
        saved = true;
    }
    if !saved {
        return Err(AppError::Validation("multipart upload missing a `file` field".to_string()));
    }

    let input_media_path = paths.dir.join(&filename).display().to_string();
    let job = Job::new(job_id.clone(), input_media_path, default_settings(), now_ms());
    state.queue.create(job);

    Ok(Json(UploadResponse { job_id, filename, queue_position: None }))
}

/// `POST /api/create-job` — job over a file already present in an input
/// directory (no upload round-trip).
pub async fn create_job(State(state): State<AppState>, Json(req): Json<CreateJobRequest>) -> AppResult<Json<UploadResponse>> {
    let job_id = Uuid::new_v4().to_string();
    let settings = req.settings.map(Into::into).unwrap_or_else(default_settings);
    let filename = std::path::Path::new(&req.input_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| req.input_path.clone());

    let job = Job::new(job_id.clone(), req.input_path, settings, now_ms());
    state.queue.create(job);

    Ok(Json(UploadResponse { job_id, filename, queue_position: None }))
}

/// `POST /api/start` — applies any settings override and enqueues the job.
pub async fn start(State(state): State<AppState>, Json(req): Json<StartRequest>) -> AppResult<Json<StartResponse>> {
    if let Some(settings) = req.settings {
        let mut job = state.queue.get(&req.job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {}", req.job_id)))?;
        job.settings = settings.into();
        state.queue.create(job);
    }
    state.queue.enqueue(&req.job_id)?;
    Ok(Json(StartResponse { started: true, queue_position: queue_position(&state, &req.job_id) }))
}

pub async fn pause(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<()> {
    state.queue.pause(&job_id)
}

pub async fn resume(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<()> {
    state.queue.resume(&job_id)
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<CancelQuery>,
) -> AppResult<()> {
    state.queue.cancel(&job_id, query.delete_data)
}

pub async fn prioritize(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<PrioritizeQuery>,
) -> AppResult<()> {
    let mode = query.mode.unwrap_or(state.config.default_queue_policy);
    state.queue.prioritize(&job_id, mode)
}

pub async fn reorder_queue(State(state): State<AppState>, Json(req): Json<ReorderRequest>) -> AppResult<()> {
    state.queue.reorder(&req.ids)
}

pub async fn status(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<Json<JobStatusResponse>> {
    let job = state.queue.get(&job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {job_id}")))?;
    Ok(Json(job_status_response(&state, job)))
}

pub async fn queue_status(State(state): State<AppState>) -> Json<crate::queue::QueueStatus> {
    Json(state.queue.queue_status())
}

pub async fn incomplete_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    let jobs = state
        .queue
        .list()
        .into_iter()
        .filter(|j| matches!(j.status, JobStatus::Queued | JobStatus::Processing | JobStatus::Paused))
        .collect();
    Json(jobs)
}

pub async fn check_resume(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<CheckResumeResponse> {
    match state.checkpoints.load(&job_id) {
        CheckpointLoadResult::Loaded(checkpoint) => Json(CheckResumeResponse {
            resumable: true,
            total_segments: Some(checkpoint.total_segments),
            processed_segments: Some(checkpoint.processed_indices.len() as u32),
        }),
        _ => Json(CheckResumeResponse { resumable: false, total_segments: None, processed_segments: None }),
    }
}

/// `POST /api/restore-job/{id}` — re-enqueues a job from its checkpoint,
/// restoring `total_segments`/`processed_segments` onto the in-memory job
/// snapshot so the UI reflects partial progress immediately (spec.md §4.5
/// restart contract, spec.md §8 scenario 2).
pub async fn restore_job(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<Json<StartResponse>> {
    let checkpoint = match state.checkpoints.load(&job_id) {
        CheckpointLoadResult::Loaded(checkpoint) => checkpoint,
        CheckpointLoadResult::NotFound => return Err(AppError::Validation(format!("no checkpoint for job {job_id}"))),
        CheckpointLoadResult::Corrupt { quarantined_path } => {
            return Err(AppError::Validation(format!("checkpoint corrupt, quarantined at {}", quarantined_path.display())))
        }
    };
    let mut job = state.queue.get(&job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {job_id}")))?;
    job.total_segments = Some(checkpoint.total_segments);
    job.processed_segments = Some(checkpoint.processed_indices.len() as u32);
    job.phase = checkpoint.phase;
    state.queue.create(job);
    state.queue.enqueue(&job_id)?;
    Ok(Json(StartResponse { started: true, queue_position: queue_position(&state, &job_id) }))
}

/// `GET /api/transcription-text/{id}` — aligned result if present, else the
/// unaligned partial built from the checkpoint (spec.md §4.5: never pushed
/// via SSE).
pub async fn transcription_text(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<Json<Vec<crate::domain::Sentence>>> {
    let paths = JobPaths::new(state.config.job_dir(&job_id));
    if let Ok(bytes) = std::fs::read(paths.aligned()) {
        let sentences: Vec<crate::domain::Sentence> =
            serde_json::from_slice(&bytes).map_err(|e| AppError::Internal(e.to_string()))?;
        return Ok(Json(sentences));
    }
    match state.checkpoints.load(&job_id) {
        CheckpointLoadResult::Loaded(checkpoint) => {
            let mut sentences: Vec<crate::domain::Sentence> = checkpoint
                .unaligned_results
                .iter()
                .flat_map(|r| {
                    r.segments.iter().map(|s| crate::domain::Sentence {
                        text: s.text.clone(),
                        start_ms: s.start_ms,
                        end_ms: s.end_ms,
                        confidence: 1.0,
                        words: Vec::new(),
                    })
                })
                .collect();
            sentences.sort_by_key(|s| s.start_ms);
            Ok(Json(sentences))
        }
        _ => Ok(Json(Vec::new())),
    }
}

pub async fn download(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<Vec<u8>> {
    let paths = JobPaths::new(state.config.job_dir(&job_id));
    std::fs::read(paths.output_srt()).map_err(|_| AppError::Validation(format!("no output subtitle for job {job_id}")))
}
