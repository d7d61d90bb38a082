use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::Stream;

use crate::domain::{Event, EventChannel, EventKind};
use crate::error::{AppError, AppResult};

use super::state::AppState;

/// Maps an event to the SSE `event:` name spec.md §6 assigns it. The
/// per-job channel calls progress updates `progress`; the global channel
/// calls the same payload `job_progress` — the two streams are documented
/// with different vocabularies even though they carry the same `EventKind`.
fn sse_event_name(kind: &EventKind, is_job_channel: bool) -> &'static str {
    match kind {
        EventKind::InitialState { .. } => "initial_state",
        EventKind::QueueUpdate { .. } => "queue_update",
        EventKind::JobStatus { .. } => "job_status",
        EventKind::JobProgress { .. } => {
            if is_job_channel {
                "progress"
            } else {
                "job_progress"
            }
        }
        EventKind::Fragment { .. } => "fragment",
        EventKind::Signal { .. } => "signal",
        EventKind::Ping { .. } => "ping",
    }
}

fn to_sse_event(event: Event, is_job_channel: bool) -> Result<SseEvent, Infallible> {
    let name = sse_event_name(&event.kind, is_job_channel);
    let payload = serde_json::json!({ "monotonicId": event.monotonic_id, "data": event.kind });
    Ok(SseEvent::default().event(name).json_data(payload).unwrap_or_else(|_| SseEvent::default().event(name)))
}

/// `GET /api/stream/{job_id}` — per-job SSE. First message is always
/// `initial_state`, built from the current in-memory snapshot immediately
/// before subscribing (spec.md §4.2: "reconnect is full refetch").
pub async fn job_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let job = state.queue.get(&job_id).ok_or_else(|| AppError::Validation(format!("unknown job id {job_id}")))?;
    let media = state.media.artifacts(&job_id);
    let snapshot = serde_json::json!({ "job": job, "media": media });

    let mut rx = state.events.subscribe(EventChannel::Job { job_id: job_id.clone() }, snapshot);
    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield to_sse_event(event, true);
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10))))
}

/// `GET /api/events/global` — queue-scope SSE.
pub async fn global_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let snapshot = serde_json::to_value(state.queue.queue_status()).unwrap_or(serde_json::Value::Null);
    let mut rx = state.events.subscribe(EventChannel::Global, snapshot);
    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield to_sse_event(event, false);
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10)))
}
