mod support;

use std::sync::Arc;

use subcontrol::circuit_engine::CircuitEngineConfig;
use subcontrol::domain::{
    Checkpoint, EngineSettings, Job, JobPhase, JobStatus, OnBreakPolicy, SentenceSplitConfig,
    SeparationPolicy, UnalignedResult, UnalignedSentence,
};
use subcontrol::events::EventBus;
use subcontrol::models::{HardwareProfile, ModelSupervisor, NoopLoader};
use subcontrol::persistence::{CheckpointStore, JobPaths};
use subcontrol::pipeline::{CancelToken, PauseGate, PipelineContext, PipelineRunner};

use support::{flat_segments, job_dir, CopySeparator, FakeTranscoder, FixedConfidenceRecognizer, PassthroughAligner};

fn settings() -> EngineSettings {
    EngineSettings {
        model_id: "primary".into(),
        compute_precision: "fp16".into(),
        device: "cpu".into(),
        batch_size: 1,
        word_level_timestamps: false,
        separation_policy: SeparationPolicy::Off,
        on_break_policy: OnBreakPolicy::Continue,
        problem_segment_suffix: subcontrol::domain::default_problem_segment_suffix(),
    }
}

fn fake_result(idx: u32) -> UnalignedResult {
    UnalignedResult {
        segment_index: idx,
        language: Some("en".into()),
        segments: vec![UnalignedSentence {
            id: format!("{idx}-0"),
            start_ms: idx as u64 * 1_000,
            end_ms: idx as u64 * 1_000 + 900,
            text: format!("segment {idx}"),
        }],
    }
}

/// Scenario 2 (spec.md §8): a checkpoint with 4 of 10 segments already
/// processed survives a process restart. A fresh `PipelineRunner` against
/// the same job directory resumes at segment 4 and the rendered SRT
/// contains all ten segments in order.
#[test]
fn resumes_from_checkpoint_at_first_unprocessed_segment() {
    let root = tempfile::tempdir().unwrap();
    let jobs_dir = root.path().join("jobs");
    std::fs::create_dir_all(&jobs_dir).unwrap();

    let job_id = "job-resume-1".to_string();
    let paths = JobPaths::new(job_dir(root.path(), &job_id));
    std::fs::create_dir_all(&paths.dir).unwrap();

    let checkpoints = Arc::new(CheckpointStore::new(jobs_dir));

    let mut checkpoint = Checkpoint::new(job_id.clone(), 10, flat_segments(10, 1_000), settings());
    checkpoint.phase = JobPhase::Transcribe;
    for idx in 0..4 {
        checkpoint.mark_processed(idx, fake_result(idx));
    }
    checkpoints.save(&checkpoint).unwrap();

    let events = Arc::new(EventBus::new());
    let models = Arc::new(ModelSupervisor::new(HardwareProfile::NoGpu, Box::new(NoopLoader)));

    let ctx = PipelineContext {
        checkpoints,
        events,
        models,
        hardware: HardwareProfile::NoGpu,
        paths: paths.clone(),
        transcoder: Arc::new(FakeTranscoder { segments: flat_segments(10, 1_000) }),
        primary_recognizer: Arc::new(FixedConfidenceRecognizer { confidence: 0.95 }),
        fallback_recognizer: Arc::new(FixedConfidenceRecognizer { confidence: 0.99 }),
        aligner: Arc::new(PassthroughAligner),
        separator: Arc::new(CopySeparator),
        circuit_config: CircuitEngineConfig::default(),
        sentence_config: SentenceSplitConfig::default(),
        cancel: CancelToken::new(),
        pause: PauseGate::new(),
    };

    let mut job = Job::new(job_id, "input.mp4".into(), settings(), 0);
    job.total_segments = Some(10);
    let runner = PipelineRunner::new(ctx);
    runner.run(&mut job).expect("resumed pipeline run should succeed");

    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.processed_segments, Some(10));

    let srt = std::fs::read_to_string(paths.output_srt()).unwrap();
    for idx in 0..4 {
        assert!(srt.contains(&format!("segment {idx}")), "missing checkpointed segment {idx} in rendered SRT: {srt}");
    }
    for idx in 4..10 {
        assert!(
            srt.contains(&format!("primary:segments/{idx}.wav")),
            "missing freshly-transcribed segment {idx} in rendered SRT: {srt}"
        );
    }

    let aligned: Vec<serde_json::Value> =
        serde_json::from_slice(&std::fs::read(paths.aligned()).unwrap()).unwrap();
    assert_eq!(aligned.len(), 10);
}
