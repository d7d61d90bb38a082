use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::domain::ArtifactKind;
use crate::error::{AppError, AppResult};
use crate::persistence::JobPaths;

use super::dto::{PeaksQuery, ProgressiveStatusResponse, SaveSrtRequest, ThumbnailsQuery};
use super::state::AppState;

fn job_paths(state: &AppState, job_id: &str) -> JobPaths {
    JobPaths::new(state.config.job_dir(job_id))
}

async fn serve_file(path: std::path::PathBuf, req: Request<Body>) -> AppResult<Response> {
    if !path.exists() {
        return Err(AppError::Validation(format!("{} does not exist", path.display())));
    }
    let response = ServeFile::new(path).oneshot(req).await.map_err(|e| AppError::Io(e.to_string()))?;
    Ok(response.into_response())
}

/// `GET /api/media/{job_id}/video` — byte-range capable, serves the best
/// available tier (spec.md §4.7 `best_available_url`).
pub async fn video(State(state): State<AppState>, Path(job_id): Path<String>, req: Request<Body>) -> AppResult<Response> {
    let paths = job_paths(&state, &job_id);
    let best = state.media.best_available_url(&job_id, &paths);
    serve_file(best, req).await
}

/// `GET /api/media/{job_id}/audio` — wav, byte-range capable.
pub async fn audio(State(state): State<AppState>, Path(job_id): Path<String>, req: Request<Body>) -> AppResult<Response> {
    let paths = job_paths(&state, &job_id);
    serve_file(paths.audio_wav(), req).await
}

/// Picks up to `count` values from `data`, evenly spaced, taking the
/// loudest (max-abs) sample in each covered span — the same aggregation the
/// media supervisor uses when it first precomputes `peaks.json`.
fn downsample_peaks(data: &[i16], count: usize) -> Vec<i16> {
    if count == 0 || data.len() <= count {
        return data.to_vec();
    }
    let bucket = (data.len() as f64 / count as f64).ceil() as usize;
    data.chunks(bucket.max(1)).map(|c| c.iter().copied().map(i16::abs).max().unwrap_or(0)).collect()
}

/// `count` evenly spaced indices into `0..len`, for sampling down a larger
/// fixed-size collection (the thumbnail tile index) to a requested size.
fn evenly_spaced_indices(len: usize, count: usize) -> Vec<usize> {
    if count == 0 || len == 0 {
        return Vec::new();
    }
    (0..count.min(len)).map(|i| i * len / count).collect()
}

pub async fn peaks(State(state): State<AppState>, Path(job_id): Path<String>, Query(query): Query<PeaksQuery>) -> AppResult<Response> {
    let paths = job_paths(&state, &job_id);
    let bytes = std::fs::read(paths.peaks()).map_err(|_| AppError::Validation(format!("peaks not available for job {job_id}")))?;
    let body = match query.samples {
        Some(n) => {
            let full: Vec<i16> = serde_json::from_slice(&bytes).map_err(|e| AppError::Internal(e.to_string()))?;
            let sampled = downsample_peaks(&full, n as usize);
            serde_json::to_vec(&sampled).map_err(|e| AppError::Internal(e.to_string()))?
        }
        None => bytes,
    };
    Ok(([(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response())
}

pub async fn thumbnails(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<ThumbnailsQuery>,
) -> AppResult<Response> {
    let paths = job_paths(&state, &job_id);
    if query.sprite {
        let bytes =
            std::fs::read(paths.thumbs_jpg()).map_err(|_| AppError::Validation(format!("thumbnails not available for job {job_id}")))?;
        return Ok(([(axum::http::header::CONTENT_TYPE, "image/jpeg")], bytes).into_response());
    }
    let bytes =
        std::fs::read(paths.thumbs_json()).map_err(|_| AppError::Validation(format!("thumbnails not available for job {job_id}")))?;
    let body = match query.count {
        Some(n) => {
            let tiles: Vec<serde_json::Value> = serde_json::from_slice(&bytes).map_err(|e| AppError::Internal(e.to_string()))?;
            let selected: Vec<serde_json::Value> =
                evenly_spaced_indices(tiles.len(), n as usize).into_iter().map(|i| tiles[i].clone()).collect();
            serde_json::to_vec(&selected).map_err(|e| AppError::Internal(e.to_string()))?
        }
        None => bytes,
    };
    Ok(([(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response())
}

pub async fn get_srt(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<String> {
    let paths = job_paths(&state, &job_id);
    std::fs::read_to_string(paths.output_srt()).map_err(|_| AppError::Validation(format!("no subtitle output for job {job_id}")))
}

/// `POST /api/media/{job_id}/srt` — validates the body parses as SRT before
/// saving, so a malformed manual edit cannot silently corrupt the on-disk
/// file (spec.md §4.8 uniform error handling).
pub async fn save_srt(State(state): State<AppState>, Path(job_id): Path<String>, Json(req): Json<SaveSrtRequest>) -> AppResult<()> {
    crate::srt::parse(&req.srt)?;
    let paths = job_paths(&state, &job_id);
    std::fs::write(paths.output_srt(), req.srt)?;
    Ok(())
}

pub async fn info(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<crate::domain::MediaArtifacts> {
    Json(state.media.artifacts(&job_id))
}

/// `GET /api/media/{job_id}/progressive-status`.
pub async fn progressive_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<ProgressiveStatusResponse> {
    let artifacts = state.media.artifacts(&job_id);
    let best = format!("{:?}", artifacts.best_available());
    Json(ProgressiveStatusResponse { best, artifacts })
}

pub async fn post_process(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<()> {
    let job = state.queue.get(&job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {job_id}")))?;
    let paths = job_paths(&state, &job_id);
    state.media.request_all(&job_id, std::path::PathBuf::from(job.input_media_path), paths);
    Ok(())
}

pub async fn generate_preview(State(state): State<AppState>, Path(job_id): Path<String>) -> AppResult<()> {
    let job = state.queue.get(&job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {job_id}")))?;
    let paths = job_paths(&state, &job_id);
    state.media.request(&job_id, ArtifactKind::PreviewProxy360p, std::path::PathBuf::from(job.input_media_path), paths);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_peaks_keeps_data_under_the_requested_count() {
        let full: Vec<i16> = (0..1000).map(|i| (i % 100) as i16).collect();
        let sampled = downsample_peaks(&full, 50);
        assert!(sampled.len() <= 50);
    }

    #[test]
    fn downsample_peaks_is_a_no_op_when_already_short_enough() {
        let full = vec![1, 2, 3];
        assert_eq!(downsample_peaks(&full, 10), full);
    }

    #[test]
    fn evenly_spaced_indices_covers_the_full_range() {
        let indices = evenly_spaced_indices(100, 10);
        assert_eq!(indices.len(), 10);
        assert_eq!(indices.first(), Some(&0));
        assert!(indices.last().unwrap() < &100);
    }

    #[test]
    fn evenly_spaced_indices_caps_at_the_source_length() {
        assert_eq!(evenly_spaced_indices(3, 10).len(), 3);
    }
}
