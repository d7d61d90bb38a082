use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};

use serde::Serialize;

use crate::config::QueuePolicy;
use crate::domain::{EventChannel, EventKind, Job, JobStatus};
use crate::error::AppError;
use crate::events::EventBus;
use crate::persistence::{save_job, save_queue_state, CheckpointStore, QueueStateFile};
use crate::pipeline::{CancelToken, PauseGate};
use crate::sync_ext::{CondvarExt, MutexExt};

use super::state::State;

/// Point-in-time view of queue ordering and preemption links (spec.md §6
/// `GET /api/queue-status`). Also used to build the `initial_state` snapshot
/// for the global SSE channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue: Vec<String>,
    pub running: Option<String>,
    pub paused: Vec<String>,
    pub interrupted_by: HashMap<String, String>,
}

/// C6: job queue and scheduler. A single mutex guards all queue/job state
/// (grounded on the teacher's single-`EngineState`-mutex shape); a condvar
/// wakes the one pipeline worker thread when a job becomes runnable.
pub struct JobQueue {
    state: Mutex<State>,
    cv: Condvar,
    events: std::sync::Arc<EventBus>,
    checkpoints: std::sync::Arc<CheckpointStore>,
    queue_state_path: PathBuf,
    jobs_dir: PathBuf,
}

impl JobQueue {
    pub fn new(
        events: std::sync::Arc<EventBus>,
        checkpoints: std::sync::Arc<CheckpointStore>,
        queue_state_path: PathBuf,
        jobs_dir: PathBuf,
    ) -> Self {
        JobQueue { state: Mutex::new(State::new()), cv: Condvar::new(), events, checkpoints, queue_state_path, jobs_dir }
    }

    fn persist_job(&self, guard: &State, id: &str) {
        if let Some(job) = guard.jobs.get(id) {
            let _ = save_job(&self.jobs_dir, job);
        }
    }

    /// Rehydrates in-memory state from a previously-persisted queue file and
    /// a set of job records loaded from disk (spec.md §4.9 restart
    /// bootstrap). Jobs that were `processing` at crash time are requeued at
    /// the front rather than silently dropped.
    pub fn restore(&self, mut jobs: Vec<Job>, persisted: Option<QueueStateFile>) {
        let mut guard = self.state.lock_unpoisoned();
        for job in jobs.drain(..) {
            guard.jobs.insert(job.id.clone(), job);
        }
        if let Some(persisted) = persisted {
            guard.queue = persisted.queue.into_iter().collect();
            guard.interrupted_by = persisted.interrupted_by;
            if let Some(running) = persisted.running {
                guard.queue.push_front(running);
            }
        }
        for id in &guard.queue.clone() {
            if let Some(job) = guard.jobs.get_mut(id) {
                job.status = JobStatus::Queued;
            }
        }
        self.cv.notify_all();
    }

    fn persist_and_publish(&self, guard: &State) {
        let state_file = QueueStateFile {
            queue: guard.queue.iter().cloned().collect(),
            running: guard.running_job_id.clone(),
            paused: guard.paused_ids(),
            interrupted_by: guard.interrupted_by.clone(),
        };
        let _ = save_queue_state(&self.queue_state_path, &state_file);
        self.events.publish(
            EventChannel::Global,
            EventKind::QueueUpdate {
                queue: state_file.queue.clone(),
                running: state_file.running.clone(),
                paused: state_file.paused.clone(),
            },
        );
    }

    fn publish_status(&self, job: &Job) {
        self.events.publish(
            EventChannel::Job { job_id: job.id.clone() },
            EventKind::JobStatus { job_id: job.id.clone(), status: job.status, message: job.message.clone(), phase: job.phase },
        );
        self.events.publish(
            EventChannel::Global,
            EventKind::JobStatus { job_id: job.id.clone(), status: job.status, message: job.message.clone(), phase: job.phase },
        );
    }

    pub fn create(&self, job: Job) {
        let mut guard = self.state.lock_unpoisoned();
        let id = job.id.clone();
        guard.jobs.insert(id.clone(), job);
        self.persist_job(&guard, &id);
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        let guard = self.state.lock_unpoisoned();
        guard.jobs.get(id).cloned()
    }

    pub fn list(&self) -> Vec<Job> {
        let guard = self.state.lock_unpoisoned();
        guard.jobs.values().cloned().collect()
    }

    pub fn queue_status(&self) -> QueueStatus {
        let guard = self.state.lock_unpoisoned();
        QueueStatus {
            queue: guard.queue.iter().cloned().collect(),
            running: guard.running_job_id.clone(),
            paused: guard.paused_ids(),
            interrupted_by: guard.interrupted_by.clone(),
        }
    }

    pub fn enqueue(&self, id: &str) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        if !guard.jobs.contains_key(id) {
            return Err(AppError::Validation(format!("unknown job id {id}")));
        }
        if !guard.queue.contains(&id.to_string()) {
            guard.queue.push_back(id.to_string());
        }
        if let Some(job) = guard.jobs.get_mut(id) {
            job.status = JobStatus::Queued;
        }
        self.persist_job(&guard, id);
        self.persist_and_publish(&guard);
        if let Some(job) = guard.jobs.get(id) {
            self.publish_status(job);
        }
        self.cv.notify_all();
        Ok(())
    }

    /// Blocks until a job is runnable (queue non-empty and nothing running),
    /// pops it, and registers fresh control handles for it. Returns `None`
    /// only if `shutdown` unblocks the wait without work (callers treat a
    /// spurious wake with an empty queue as "keep waiting").
    pub fn take_next(&self) -> (String, CancelToken, PauseGate) {
        let mut guard = self.state.lock_unpoisoned();
        loop {
            if guard.running_job_id.is_none() {
                if let Some(id) = guard.queue.pop_front() {
                    guard.running_job_id = Some(id.clone());
                    let cancel = CancelToken::new();
                    let pause = PauseGate::new();
                    guard.running_control = Some((cancel.clone(), pause.clone()));
                    if let Some(job) = guard.jobs.get_mut(&id) {
                        job.status = JobStatus::Processing;
                    }
                    self.persist_job(&guard, &id);
                    self.persist_and_publish(&guard);
                    if let Some(job) = guard.jobs.get(&id) {
                        self.publish_status(job);
                    }
                    return (id, cancel, pause);
                }
            }
            guard = self.cv.wait_unpoisoned(guard);
        }
    }

    /// Called by the worker after a job settles into a terminal or paused
    /// state. Handles `force`-preemption auto-resumption (spec.md §4.6).
    pub fn settle(&self, id: &str, job: Job) {
        let mut guard = self.state.lock_unpoisoned();
        guard.jobs.insert(id.to_string(), job);
        self.persist_job(&guard, id);
        if guard.running_job_id.as_deref() == Some(id) {
            guard.running_job_id = None;
            guard.running_control = None;
        }

        if let Some((preempted, _)) = guard.interrupted_by.iter().find(|(_, v)| *v == id).map(|(k, v)| (k.clone(), v.clone())) {
            guard.interrupted_by.remove(&preempted);
            guard.queue.push_front(preempted.clone());
            if let Some(job) = guard.jobs.get_mut(&preempted) {
                job.status = JobStatus::Queued;
            }
            self.persist_job(&guard, &preempted);
        }

        self.persist_and_publish(&guard);
        self.cv.notify_all();
    }

    pub fn pause(&self, id: &str) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        if guard.running_job_id.as_deref() == Some(id) {
            if let Some((_, pause_gate)) = &guard.running_control {
                pause_gate.pause();
            }
            self.persist_and_publish(&guard);
            return Ok(());
        }
        if guard.queue.iter().any(|q| q == id) {
            guard.queue.retain(|q| q != id);
            if let Some(job) = guard.jobs.get_mut(id) {
                job.status = JobStatus::Paused;
            }
            self.persist_job(&guard, id);
            self.persist_and_publish(&guard);
            if let Some(job) = guard.jobs.get(id) {
                self.publish_status(job);
            }
            return Ok(());
        }
        // Already paused: pause is idempotent (spec.md §5).
        if guard.jobs.get(id).map(|j| j.status) == Some(JobStatus::Paused) {
            return Ok(());
        }
        Err(AppError::Validation(format!("job {id} is not running or queued")))
    }

    pub fn resume(&self, id: &str) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        match guard.jobs.get(id).map(|j| j.status) {
            Some(JobStatus::Paused) => {
                guard.queue.push_back(id.to_string());
                if let Some(job) = guard.jobs.get_mut(id) {
                    job.status = JobStatus::Queued;
                }
                self.persist_job(&guard, id);
                self.persist_and_publish(&guard);
                if let Some(job) = guard.jobs.get(id) {
                    self.publish_status(job);
                }
                self.cv.notify_all();
                Ok(())
            }
            // Already running/queued: resume is idempotent (spec.md §5).
            Some(JobStatus::Queued) | Some(JobStatus::Processing) => Ok(()),
            _ => Err(AppError::Validation(format!("job {id} is not paused"))),
        }
    }

    pub fn cancel(&self, id: &str, delete_data: bool) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        guard.queue.retain(|q| q != id);
        if guard.running_job_id.as_deref() == Some(id) {
            if let Some((cancel_token, pause_gate)) = &guard.running_control {
                cancel_token.cancel();
                pause_gate.resume();
            }
        } else if let Some(job) = guard.jobs.get_mut(id) {
            job.status = JobStatus::Canceled;
        }
        self.persist_job(&guard, id);
        if delete_data {
            let _ = self.checkpoints.purge(id);
        }
        self.persist_and_publish(&guard);
        Ok(())
    }

    /// `gentle`: move to front, let the running job finish naturally.
    /// `force`: move to front and preempt whatever is running.
    pub fn prioritize(&self, id: &str, mode: QueuePolicy) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        if !guard.jobs.contains_key(id) {
            return Err(AppError::Validation(format!("unknown job id {id}")));
        }
        guard.queue.retain(|q| q != id);
        guard.queue.push_front(id.to_string());

        if mode == QueuePolicy::Force {
            if let Some(running_id) = guard.running_job_id.clone() {
                if running_id != id {
                    if let Some((cancel_token, pause_gate)) = &guard.running_control {
                        let _ = cancel_token;
                        pause_gate.pause();
                    }
                    guard.interrupted_by.insert(running_id.clone(), id.to_string());
                }
            }
        }

        self.persist_and_publish(&guard);
        Ok(())
    }

    /// Accepts only a permutation of the exact current queued set (spec.md
    /// §4.6 "reorder preserves set-equality with the live queue").
    pub fn reorder(&self, ids: &[String]) -> Result<(), AppError> {
        let mut guard = self.state.lock_unpoisoned();
        let mut current: Vec<String> = guard.queue.iter().cloned().collect();
        current.sort();
        let mut requested = ids.to_vec();
        requested.sort();
        if current != requested {
            return Err(AppError::Validation("reorder must be a permutation of the current queue".into()));
        }
        guard.queue = ids.iter().cloned().collect();
        self.persist_and_publish(&guard);
        Ok(())
    }
}
