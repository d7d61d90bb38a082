use std::sync::Arc;

use crate::config::Config;
use crate::events::EventBus;
use crate::media_supervisor::MediaSupervisor;
use crate::models::ModelSupervisor;
use crate::persistence::CheckpointStore;
use crate::queue::JobQueue;
use crate::shutdown::ShutdownSupervisor;

/// Shared handle set every handler closes over (spec.md §4.8). Cloning is
/// cheap — every field is already an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<JobQueue>,
    pub events: Arc<EventBus>,
    pub checkpoints: Arc<CheckpointStore>,
    pub media: Arc<MediaSupervisor>,
    pub models: Arc<ModelSupervisor>,
    pub shutdown: Arc<ShutdownSupervisor>,
}
