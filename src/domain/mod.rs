//! Core data types shared across the orchestration control plane.

mod checkpoint;
mod circuit;
mod event;
mod fragment;
mod job;
mod joblog;
mod media;
mod segment;
mod sentence;

pub use checkpoint::{Checkpoint, UnalignedResult, UnalignedSentence, CHECKPOINT_SCHEMA_VERSION};
pub use circuit::{CircuitState, FuseDecision, ModelChangeEntry, MusicalityLevel, SeparationTier};
pub use event::{Event, EventChannel, EventKind, SignalKind};
pub use fragment::{TranscriptionFragment, Word};
pub use job::{
    default_problem_segment_suffix, EngineSettings, Job, JobPhase, JobStatus, OnBreakPolicy,
    PreemptionInfo, SeparationPolicy,
};
pub use joblog::JobLogLine;
pub use media::{ArtifactKind, ArtifactState, MediaArtifacts};
pub use segment::{segments_are_valid, Segment, SEGMENT_MAX_DURATION_MS, SEGMENT_TARGET_DURATION_MS};
pub use sentence::{split_into_sentences, Sentence, SentenceSplitConfig};
