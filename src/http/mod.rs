//! C8: HTTP/SSE surface. One thin handler per endpoint, all driven off the
//! same `AppState` the engine bootstrap builds once (spec.md §6).

mod dto;
mod jobs;
mod media;
mod router;
mod state;
mod streaming;
mod system;

pub use router::router;
pub use state::AppState;
