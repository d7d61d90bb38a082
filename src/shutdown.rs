//! C10: Shutdown Supervisor. Tracks connected clients via a heartbeat
//! registry; when the grace window elapses with no heartbeat and no running
//! or queued jobs, the caller is told to begin a graceful drain (spec.md
//! §4.10). Grounded on the teacher's exit-wait sequence in `lib.rs`
//! (`exit_auto_wait_snapshot` + `pause_processing_jobs_for_exit`), adapted
//! from a single-process window-close event to an HTTP heartbeat registry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::sync_ext::MutexExt;

struct State {
    clients: HashMap<String, Instant>,
    shutting_down: bool,
}

/// C10: client-liveness tracking plus the grace-window decision of whether
/// it is safe to begin a graceful drain.
pub struct ShutdownSupervisor {
    state: Mutex<State>,
    grace_window: Duration,
}

impl ShutdownSupervisor {
    pub fn new(grace_window: Duration) -> Self {
        ShutdownSupervisor { state: Mutex::new(State { clients: HashMap::new(), shutting_down: false }), grace_window }
    }

    pub fn register(&self, client_id: &str) {
        let mut state = self.state.lock_unpoisoned();
        state.clients.insert(client_id.to_string(), Instant::now());
    }

    pub fn heartbeat(&self, client_id: &str) {
        let mut state = self.state.lock_unpoisoned();
        state.clients.insert(client_id.to_string(), Instant::now());
    }

    pub fn unregister(&self, client_id: &str) {
        let mut state = self.state.lock_unpoisoned();
        state.clients.remove(client_id);
    }

    pub fn explicit_shutdown_requested(&self) {
        let mut state = self.state.lock_unpoisoned();
        state.shutting_down = true;
    }

    /// True once an explicit shutdown was requested, or once every
    /// registered client has gone quiet for longer than the grace window
    /// AND there are no running or queued jobs (spec.md §4.10: "no client
    /// has sent a heartbeat within a grace window... and there are no
    /// running or queued jobs"). `jobs_active` is supplied by the caller
    /// (the job queue is this module's only external dependency and stays
    /// out of it to keep heartbeat tracking testable in isolation). An
    /// empty client set counts as quiet — a fresh server with nobody
    /// connected yet is not held open by heartbeat tracking alone. An
    /// explicit shutdown request always short-circuits, even with jobs
    /// still active, since an operator asking to stop takes priority.
    pub fn grace_window_elapsed(&self, jobs_active: bool) -> bool {
        let state = self.state.lock_unpoisoned();
        if state.shutting_down {
            return true;
        }
        if jobs_active {
            return false;
        }
        state.clients.values().all(|last_seen| last_seen.elapsed() >= self.grace_window)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock_unpoisoned().shutting_down
    }
}
