use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::job::{EngineSettings, JobPhase};
use super::segment::Segment;

/// Current schema version for `checkpoint.json` (spec.md §6).
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnalignedSentence {
    pub id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnalignedResult {
    pub segment_index: u32,
    pub language: Option<String>,
    pub segments: Vec<UnalignedSentence>,
}

/// Durable partial state of a job (spec.md §3 "Checkpoint" and §6 schema).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub version: u32,
    pub job_id: String,
    pub phase: JobPhase,
    pub total_segments: u32,
    pub processed_indices: Vec<u32>,
    pub segments: Vec<Segment>,
    pub unaligned_results: Vec<UnalignedResult>,
    pub original_settings: EngineSettings,
    /// Indices of segments that tripped the circuit breaker (spec.md §8
    /// scenario 4); their rendered text gets the configured suffix.
    #[serde(default)]
    pub problem_segments: BTreeSet<u32>,
}

impl Checkpoint {
    pub fn new(job_id: String, total_segments: u32, segments: Vec<Segment>, settings: EngineSettings) -> Self {
        Checkpoint {
            version: CHECKPOINT_SCHEMA_VERSION,
            job_id,
            phase: JobPhase::Split,
            total_segments,
            processed_indices: Vec::new(),
            segments,
            unaligned_results: Vec::new(),
            original_settings: settings,
            problem_segments: BTreeSet::new(),
        }
    }

    /// `processed_indices` must be a subset of `0..total_segments` with no repeats
    /// (spec.md §8 quantified invariant).
    pub fn processed_indices_are_valid(&self) -> bool {
        let set: BTreeSet<u32> = self.processed_indices.iter().copied().collect();
        if set.len() != self.processed_indices.len() {
            return false;
        }
        set.iter().all(|idx| *idx < self.total_segments)
    }

    /// First segment index not yet processed — the restart resume point
    /// within the transcribe stage (spec.md §4.5 restart contract).
    pub fn first_unprocessed_index(&self) -> Option<u32> {
        let processed: BTreeSet<u32> = self.processed_indices.iter().copied().collect();
        (0..self.total_segments).find(|idx| !processed.contains(idx))
    }

    pub fn mark_processed(&mut self, index: u32, result: UnalignedResult) {
        if !self.processed_indices.contains(&index) {
            self.processed_indices.push(index);
        }
        self.unaligned_results.retain(|r| r.segment_index != index);
        self.unaligned_results.push(result);
    }
}
