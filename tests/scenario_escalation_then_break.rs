mod support;

use std::sync::Arc;

use subcontrol::circuit_engine::CircuitEngineConfig;
use subcontrol::domain::{
    Event, EventChannel, EngineSettings, Job, JobStatus, OnBreakPolicy, SentenceSplitConfig, SeparationPolicy,
    SignalKind,
};
use subcontrol::events::EventBus;
use subcontrol::models::{HardwareProfile, ModelSupervisor, NoopLoader};
use subcontrol::persistence::{CheckpointStore, JobPaths};
use subcontrol::pipeline::{CancelToken, PauseGate, PipelineContext, PipelineRunner};

use support::{flat_segments, job_dir, CopySeparator, FakeTranscoder, PassthroughAligner, ScriptedRecognizer};

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

fn drain(mut rx: subcontrol::events::EventReceiver) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Scenario 4 (spec.md §8): every segment comes back at very low confidence
/// with no noise tag, so each one escalates separation until the top tier is
/// exhausted and then falls through to recognizer retries. Once the
/// consecutive-low-confidence threshold (3) is hit the circuit breaker trips;
/// with `on_break=continue` the job still reaches `finished`.
#[test]
fn persistent_low_confidence_escalates_then_trips_the_breaker_and_still_finishes() {
    let root = tempfile::tempdir().unwrap();
    let jobs_dir = root.path().join("jobs");
    std::fs::create_dir_all(&jobs_dir).unwrap();

    let job_id = "job-escalate-1".to_string();
    let paths = JobPaths::new(job_dir(root.path(), &job_id));

    let checkpoints = Arc::new(CheckpointStore::new(jobs_dir));
    let events = Arc::new(EventBus::new());
    let job_channel = EventChannel::Job { job_id: job_id.clone() };
    let rx = events.subscribe(job_channel, serde_json::json!({}));
    let models = Arc::new(ModelSupervisor::new(HardwareProfile::NoGpu, Box::new(NoopLoader)));

    // Every call, for every segment, reports confidence 0.1: below the
    // upgrade threshold (0.4), so each segment walks none -> weak -> strong
    // -> fallback before the fallback recognizer is tried and force-accepted.
    let recognizer = Arc::new(ScriptedRecognizer::new(vec![0.1; 64]));

    let ctx = PipelineContext {
        checkpoints,
        events,
        models,
        hardware: HardwareProfile::NoGpu,
        paths: paths.clone(),
        transcoder: Arc::new(FakeTranscoder { segments: flat_segments(6, 1_000) }),
        primary_recognizer: recognizer.clone(),
        fallback_recognizer: recognizer,
        aligner: Arc::new(PassthroughAligner),
        separator: Arc::new(CopySeparator),
        circuit_config: CircuitEngineConfig::default(),
        sentence_config: SentenceSplitConfig::default(),
        cancel: CancelToken::new(),
        pause: PauseGate::new(),
    };

    let mut job = Job::new(job_id, "input.mp4".into(), settings(), 0);
    let runner = PipelineRunner::new(ctx);
    runner.run(&mut job).expect("job should still finish under on_break=continue");

    assert_eq!(job.status, JobStatus::Finished);

    let received = drain(rx);
    let saw_escalation = received.iter().any(|e| matches!(&e.kind, subcontrol::domain::EventKind::Signal { signal: SignalKind::ModelEscalated { .. }, .. }));
    let saw_break = received.iter().any(|e| matches!(&e.kind, subcontrol::domain::EventKind::Signal { signal: SignalKind::CircuitBreak { .. }, .. }));
    assert!(saw_escalation, "expected at least one model_escalated signal");
    assert!(saw_break, "expected a circuit_break signal once the threshold was hit");

    let srt = std::fs::read_to_string(paths.output_srt()).unwrap();
    assert!(
        srt.contains(&subcontrol::domain::default_problem_segment_suffix()),
        "expected the final subtitle to mark segments affected by the circuit break"
    );
}
