use serde::{Deserialize, Serialize};

use super::joblog::JobLogLine;

/// Lifecycle status of a job. `created` is implicit (a job is only visible
/// once `queued`); terminal states are `finished`, `failed`, `canceled`.
/// `queued` and `paused` are re-enterable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Paused,
    Finished,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// A stage of the fixed pipeline state machine (spec.md §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Extract,
    Split,
    BgmDetect,
    Separate,
    Transcribe,
    Align,
    Render,
    Complete,
}

impl JobPhase {
    pub const ORDER: [JobPhase; 8] = [
        JobPhase::Extract,
        JobPhase::Split,
        JobPhase::BgmDetect,
        JobPhase::Separate,
        JobPhase::Transcribe,
        JobPhase::Align,
        JobPhase::Render,
        JobPhase::Complete,
    ];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|p| *p == self).expect("phase in ORDER")
    }
}

/// User policy for vocal separation (spec.md §4.4 step 2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeparationPolicy {
    Off,
    Auto,
    Always,
}

/// On-break action once the circuit breaker trips (spec.md §4.4 step 5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnBreakPolicy {
    Continue,
    FallbackOriginal,
    Fail,
    Pause,
}

impl Default for OnBreakPolicy {
    fn default() -> Self {
        OnBreakPolicy::Continue
    }
}

/// Engine settings snapshot captured at job-creation time. Once a checkpoint
/// exists, the snapshot in the checkpoint is authoritative (spec.md §4.5
/// restart contract) — restart requests that change model-identity settings
/// are rejected unless the caller explicitly asks for a fresh run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub model_id: String,
    pub compute_precision: String,
    pub device: String,
    pub batch_size: u32,
    pub word_level_timestamps: bool,
    pub separation_policy: SeparationPolicy,
    #[serde(default)]
    pub on_break_policy: OnBreakPolicy,
    /// Appended to the text of any rendered sentence whose segment tripped
    /// the circuit breaker (spec.md §8 scenario 4).
    #[serde(default = "default_problem_segment_suffix")]
    pub problem_segment_suffix: String,
}

pub fn default_problem_segment_suffix() -> String {
    "[unverified]".to_string()
}

/// Describes a force-preemption link recorded against a job (spec.md §9:
/// a plain map, not bidirectional pointers — the canonical map lives in
/// `queue::scheduler`; this is the read-only view attached to job snapshots).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreemptionInfo {
    pub preempted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub input_media_path: String,
    pub output_subtitle_path: Option<String>,
    pub settings: EngineSettings,
    pub status: JobStatus,
    pub phase: JobPhase,
    /// Overall progress, 0-100, one decimal place.
    pub progress: f64,
    /// Progress within the current phase, 0-100.
    pub phase_progress: f64,
    pub message: Option<String>,
    pub detected_language: Option<String>,
    pub processed_segments: Option<u32>,
    pub total_segments: Option<u32>,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub paused_at_ms: Option<u64>,
    pub failed_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub last_error: Option<String>,
    pub preemption: Option<PreemptionInfo>,
    #[serde(default)]
    pub logs: Vec<JobLogLine>,
}

impl Job {
    pub fn new(id: String, input_media_path: String, settings: EngineSettings, now_ms: u64) -> Self {
        Job {
            id,
            input_media_path,
            output_subtitle_path: None,
            settings,
            status: JobStatus::Queued,
            phase: JobPhase::Extract,
            progress: 0.0,
            phase_progress: 0.0,
            message: None,
            detected_language: None,
            processed_segments: None,
            total_segments: None,
            created_at_ms: now_ms,
            started_at_ms: None,
            paused_at_ms: None,
            failed_at_ms: None,
            completed_at_ms: None,
            last_error: None,
            preemption: None,
            logs: Vec::new(),
        }
    }

    /// `processed <= total` whenever both are set (spec.md §3 invariant).
    pub fn counters_valid(&self) -> bool {
        match (self.processed_segments, self.total_segments) {
            (Some(p), Some(t)) => p <= t,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EngineSettings {
        EngineSettings {
            model_id: "primary".into(),
            compute_precision: "fp16".into(),
            device: "cpu".into(),
            batch_size: 1,
            word_level_timestamps: false,
            separation_policy: SeparationPolicy::Off,
            on_break_policy: OnBreakPolicy::Continue,
            problem_segment_suffix: default_problem_segment_suffix(),
        }
    }

    #[test]
    fn new_job_starts_queued_at_extract_phase() {
        let job = Job::new("job-1".into(), "in.mp4".into(), settings(), 1000);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.phase, JobPhase::Extract);
        assert_eq!(job.progress, 0.0);
    }

    #[test]
    fn counters_valid_rejects_processed_over_total() {
        let mut job = Job::new("job-1".into(), "in.mp4".into(), settings(), 1000);
        job.processed_segments = Some(5);
        job.total_segments = Some(4);
        assert!(!job.counters_valid());
    }

    #[test]
    fn phase_order_is_fixed_and_complete_is_last() {
        assert_eq!(JobPhase::Extract.index(), 0);
        assert_eq!(JobPhase::Complete.index(), JobPhase::ORDER.len() - 1);
    }
}
