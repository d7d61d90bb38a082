use std::collections::{HashMap, VecDeque};

use crate::domain::Job;
use crate::pipeline::{CancelToken, PauseGate};

/// In-memory queue/job state guarded by a single mutex, grounded on the
/// teacher's `EngineState` (`engine/state.rs`): one map of jobs by id, one
/// ordered queue of ids, plus bookkeeping sets/maps for the operations that
/// need it. Unlike the teacher (N parallel transcode workers), this control
/// plane runs exactly one job at a time (spec.md §8: `|{j: processing}| <= 1`).
pub(super) struct State {
    pub(super) jobs: HashMap<String, Job>,
    pub(super) queue: VecDeque<String>,
    pub(super) running_job_id: Option<String>,
    /// `preempted_id -> preempting_id` (spec.md §9: plain map, not
    /// bidirectional pointers).
    pub(super) interrupted_by: HashMap<String, String>,
    /// Control handles for the currently-running job, registered by the
    /// worker loop just before `PipelineRunner::run` and removed after.
    pub(super) running_control: Option<(CancelToken, PauseGate)>,
}

impl State {
    pub(super) fn new() -> Self {
        State {
            jobs: HashMap::new(),
            queue: VecDeque::new(),
            running_job_id: None,
            interrupted_by: HashMap::new(),
            running_control: None,
        }
    }

    pub(super) fn paused_ids(&self) -> Vec<String> {
        self.jobs
            .values()
            .filter(|j| j.status == crate::domain::JobStatus::Paused)
            .map(|j| j.id.clone())
            .collect()
    }
}
