use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use super::dto::ClientIdQuery;
use super::state::AppState;

pub async fn register(State(state): State<AppState>, Query(query): Query<ClientIdQuery>) {
    state.shutdown.register(&query.client_id);
}

pub async fn heartbeat(State(state): State<AppState>, Query(query): Query<ClientIdQuery>) {
    state.shutdown.heartbeat(&query.client_id);
}

pub async fn unregister(State(state): State<AppState>, Query(query): Query<ClientIdQuery>) {
    state.shutdown.unregister(&query.client_id);
}

/// `POST /api/shutdown` — forces the same sequence the heartbeat grace
/// window would otherwise trigger on its own (spec.md §4.10).
pub async fn shutdown(State(state): State<AppState>) {
    state.shutdown.explicit_shutdown_requested();
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    ok: bool,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ok: true })
}
