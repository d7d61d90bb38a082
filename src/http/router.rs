use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::{jobs, media, streaming, system};

/// Assembles the full HTTP/SSE surface (spec.md §6). Grounded in the
/// teacher's "one thin handler per command" shape, adapted from Tauri
/// `#[tauri::command]` wraps to axum route handlers over the same engine
/// facade methods.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(jobs::upload))
        .route("/api/create-job", post(jobs::create_job))
        .route("/api/start", post(jobs::start))
        .route("/api/pause/:job_id", post(jobs::pause))
        .route("/api/resume/:job_id", post(jobs::resume))
        .route("/api/cancel/:job_id", post(jobs::cancel))
        .route("/api/prioritize/:job_id", post(jobs::prioritize))
        .route("/api/reorder-queue", post(jobs::reorder_queue))
        .route("/api/status/:job_id", get(jobs::status))
        .route("/api/queue-status", get(jobs::queue_status))
        .route("/api/download/:job_id", get(jobs::download))
        .route("/api/incomplete-jobs", get(jobs::incomplete_jobs))
        .route("/api/check-resume/:job_id", get(jobs::check_resume))
        .route("/api/restore-job/:job_id", post(jobs::restore_job))
        .route("/api/transcription-text/:job_id", get(jobs::transcription_text))
        .route("/api/stream/:job_id", get(streaming::job_stream))
        .route("/api/events/global", get(streaming::global_stream))
        .route("/api/media/:job_id/video", get(media::video))
        .route("/api/media/:job_id/audio", get(media::audio))
        .route("/api/media/:job_id/peaks", get(media::peaks))
        .route("/api/media/:job_id/thumbnails", get(media::thumbnails))
        .route("/api/media/:job_id/srt", get(media::get_srt).post(media::save_srt))
        .route("/api/media/:job_id/info", get(media::info))
        .route("/api/media/:job_id/progressive-status", get(media::progressive_status))
        .route("/api/media/:job_id/post-process", post(media::post_process))
        .route("/api/media/:job_id/generate-preview", post(media::generate_preview))
        .route("/api/system/register", post(system::register))
        .route("/api/system/heartbeat", post(system::heartbeat))
        .route("/api/system/unregister", post(system::unregister))
        .route("/api/shutdown", post(system::shutdown))
        .route("/api/ping", get(system::ping))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
