use serde::{Deserialize, Serialize};

use super::circuit::SeparationTier;
use super::job::{JobPhase, JobStatus};
use super::media::ArtifactKind;
use super::sentence::Sentence;

/// Channel scope an event is published on (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum EventChannel {
    Global,
    Job { job_id: String },
}

/// Terminal/transitional signal payload (spec.md §4.2 `signal` kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SignalKind {
    JobPaused,
    JobResumed,
    JobCanceled,
    JobComplete,
    JobFailed,
    AlignmentReady,
    Proxy720pComplete,
    Preview360pComplete,
    ModelEscalated { from: SeparationTier, to: SeparationTier },
    CircuitBreak { action: String },
    BgmDetected { level: String },
    SeparationStrategy { initial: SeparationTier },
}

/// A fixed event kind with its payload (spec.md §4.2 table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    InitialState { snapshot: serde_json::Value },
    QueueUpdate { queue: Vec<String>, running: Option<String>, paused: Vec<String> },
    JobStatus { job_id: String, status: JobStatus, message: Option<String>, phase: JobPhase },
    JobProgress {
        job_id: Option<String>,
        phase: JobPhase,
        phase_percent: f64,
        overall_percent: f64,
        processed: Option<u32>,
        total: Option<u32>,
        /// Which derived artifact this progress concerns, for media-supervisor
        /// progress (spec.md §4.7); `None` for pipeline-stage progress, where
        /// `phase` already identifies the work.
        artifact: Option<ArtifactKind>,
    },
    Fragment { job_id: String, segment_index: u32, sentences: Vec<Sentence>, language: Option<String> },
    Signal { job_id: Option<String>, signal: SignalKind },
    Ping { monotonic_ms: u64 },
}

impl EventKind {
    /// `job_progress` and `ping` may be coalesced/dropped under backpressure;
    /// `signal` and `job_status` must never be dropped (spec.md §4.2).
    pub fn is_droppable(&self) -> bool {
        matches!(self, EventKind::JobProgress { .. } | EventKind::Ping { .. })
    }
}

/// An event published on a channel, ordered within that channel by
/// `monotonic_id` (spec.md §3 "Event", §8 ordering invariant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub channel: EventChannel,
    pub kind: EventKind,
    pub monotonic_id: u64,
}
