use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::circuit_engine::{self, CircuitEngineConfig};
use crate::domain::{
    CircuitState, EngineSettings, Event, EventChannel, EventKind, FuseDecision, Job, JobPhase,
    JobStatus, OnBreakPolicy, Segment, SeparationTier, Sentence, SentenceSplitConfig, SignalKind,
    UnalignedResult, UnalignedSentence,
};
use crate::error::AppError;
use crate::events::EventBus;
use crate::models::{HardwareProfile, ModelKind, ModelSupervisor};
use crate::persistence::{CheckpointLoadResult, CheckpointStore, JobPaths};

use super::cancel::{CancelToken, PauseGate};
use super::collaborators::{Aligner, Recognizer, Separator, Transcoder};
use super::weights::{StageWeights, WeightInputs};

/// Maximum retries for a transient (technical, not confidence-driven)
/// failure of a single segment before the circuit engine is consulted
/// (spec.md §4.5).
const TRANSIENT_RETRY_LIMIT: u32 = 3;
/// Escalation chain has 3 rungs (none -> weak -> strong -> fallback); one
/// additional fallback-recognizer retry is allowed after the top rung is
/// exhausted before the segment is force-accepted — this bounds the
/// per-segment loop without needing a separate iteration cap.
const MAX_ESCALATIONS_PER_SEGMENT: u32 = 4;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Everything the runner needs to drive one job through the fixed pipeline
/// (spec.md §4.5). Constructed per job by the engine facade; collaborators
/// are trait objects so the actual transcoding/recognition/alignment/
/// separation backends stay out of scope (spec.md §1).
pub struct PipelineContext {
    pub checkpoints: Arc<CheckpointStore>,
    pub events: Arc<EventBus>,
    pub models: Arc<ModelSupervisor>,
    pub hardware: HardwareProfile,
    pub paths: JobPaths,
    pub transcoder: Arc<dyn Transcoder>,
    pub primary_recognizer: Arc<dyn Recognizer>,
    pub fallback_recognizer: Arc<dyn Recognizer>,
    pub aligner: Arc<dyn Aligner>,
    pub separator: Arc<dyn Separator>,
    pub circuit_config: CircuitEngineConfig,
    pub sentence_config: SentenceSplitConfig,
    pub cancel: CancelToken,
    pub pause: PauseGate,
}

pub struct PipelineRunner {
    ctx: PipelineContext,
}

impl PipelineRunner {
    pub fn new(ctx: PipelineContext) -> Self {
        PipelineRunner { ctx }
    }

    fn publish(&self, job_id: &str, kind: EventKind) {
        self.ctx.events.publish(EventChannel::Job { job_id: job_id.to_string() }, kind.clone());
        self.ctx.events.publish(EventChannel::Global, kind);
    }

    fn transition(&self, job: &mut Job, phase: JobPhase) {
        job.phase = phase;
        job.phase_progress = 0.0;
        self.publish(
            &job.id,
            EventKind::JobStatus { job_id: job.id.clone(), status: job.status, message: job.message.clone(), phase },
        );
    }

    fn report_progress(&self, job: &mut Job, weights: &StageWeights, phase_percent: f64) {
        job.phase_progress = phase_percent;
        job.progress = overall_percent(weights, job.phase, phase_percent);
        self.publish(
            &job.id,
            EventKind::JobProgress {
                job_id: Some(job.id.clone()),
                phase: job.phase,
                phase_percent,
                overall_percent: job.progress,
                processed: job.processed_segments,
                total: job.total_segments,
                artifact: None,
            },
        );
    }

    fn should_stop(&self, job: &mut Job) -> bool {
        if self.ctx.cancel.is_cancelled() {
            job.status = JobStatus::Canceled;
            self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobCanceled });
            return true;
        }
        if self.ctx.pause.is_paused() {
            job.status = JobStatus::Paused;
            job.paused_at_ms = Some(now_ms());
            self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobPaused });
            let cancelled = self.ctx.pause.wait_while_paused(&self.ctx.cancel);
            if !cancelled {
                job.status = JobStatus::Processing;
                job.paused_at_ms = None;
                self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobResumed });
            }
            return cancelled;
        }
        false
    }

    /// Runs `job` to completion (or cancellation/pause/failure), resuming
    /// from an on-disk checkpoint when one exists (spec.md §4.5 restart
    /// contract).
    pub fn run(&self, job: &mut Job) -> Result<(), AppError> {
        let mut checkpoint = match self.ctx.checkpoints.load(&job.id) {
            CheckpointLoadResult::Loaded(cp) => {
                reject_settings_drift(&cp.original_settings, &job.settings)?;
                cp
            }
            CheckpointLoadResult::NotFound => crate::domain::Checkpoint::new(job.id.clone(), 0, Vec::new(), job.settings.clone()),
            CheckpointLoadResult::Corrupt { quarantined_path } => {
                return Err(AppError::Internal(format!(
                    "checkpoint for job {} was corrupt and quarantined at {}",
                    job.id,
                    quarantined_path.display()
                )));
            }
        };

        job.status = JobStatus::Processing;
        job.started_at_ms.get_or_insert(now_ms());

        if checkpoint.phase.index() <= JobPhase::Extract.index() {
            self.transition(job, JobPhase::Extract);
            self.ctx.transcoder.extract_audio(std::path::Path::new(&job.input_media_path), &self.ctx.paths.audio_wav())?;
            self.report_progress(job, &StageWeights::compute(&default_weight_inputs(job)), 100.0);
            checkpoint.phase = JobPhase::Split;
            self.save(&checkpoint)?;
        }
        if self.should_stop(job) {
            return Ok(());
        }

        if checkpoint.phase.index() <= JobPhase::Split.index() {
            self.transition(job, JobPhase::Split);
            let segments = self.ctx.transcoder.split_segments(&self.ctx.paths.audio_wav(), &self.ctx.paths.dir.join("segments"))?;
            checkpoint.total_segments = segments.len() as u32;
            checkpoint.segments = segments;
            job.total_segments = Some(checkpoint.total_segments);
            self.report_progress(job, &StageWeights::compute(&default_weight_inputs(job)), 100.0);
            checkpoint.phase = JobPhase::BgmDetect;
            self.save(&checkpoint)?;
        }
        if self.should_stop(job) {
            return Ok(());
        }

        if checkpoint.phase.index() <= JobPhase::BgmDetect.index() {
            self.transition(job, JobPhase::BgmDetect);
            self.run_bgm_detect(job, &mut checkpoint)?;
            checkpoint.phase = JobPhase::Transcribe;
            self.save(&checkpoint)?;
        }
        if self.should_stop(job) {
            return Ok(());
        }

        self.transition(job, JobPhase::Transcribe);
        let mut circuit_state = CircuitState::default();
        let weights = StageWeights::compute(&weight_inputs_from_checkpoint(job, &checkpoint));
        let broke = self.run_transcribe(job, &mut checkpoint, &mut circuit_state, &weights)?;
        if self.should_stop(job) {
            return Ok(());
        }
        if broke && matches!(job.settings.on_break_policy, OnBreakPolicy::Fail) {
            job.status = JobStatus::Failed;
            job.failed_at_ms = Some(now_ms());
            job.last_error = Some("circuit breaker tripped".into());
            self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobFailed });
            return Err(AppError::CircuitBreak("consecutive low-confidence threshold reached".into()));
        }
        if broke && matches!(job.settings.on_break_policy, OnBreakPolicy::Pause) {
            checkpoint.phase = JobPhase::Transcribe;
            self.save(&checkpoint)?;
            job.status = JobStatus::Paused;
            job.paused_at_ms = Some(now_ms());
            self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobPaused });
            return Ok(());
        }

        if checkpoint.phase.index() <= JobPhase::Align.index() {
            self.transition(job, JobPhase::Align);
            self.run_align(job, &mut checkpoint, &weights)?;
            checkpoint.phase = JobPhase::Render;
            self.save(&checkpoint)?;
        }
        if self.should_stop(job) {
            return Ok(());
        }

        if checkpoint.phase.index() <= JobPhase::Render.index() {
            self.transition(job, JobPhase::Render);
            self.run_render(job, &checkpoint)?;
            self.report_progress(job, &weights, 100.0);
            checkpoint.phase = JobPhase::Complete;
            self.save(&checkpoint)?;
        }

        self.transition(job, JobPhase::Complete);
        job.status = JobStatus::Finished;
        job.progress = 100.0;
        job.completed_at_ms = Some(now_ms());
        self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::JobComplete });
        Ok(())
    }

    fn save(&self, checkpoint: &crate::domain::Checkpoint) -> Result<(), AppError> {
        self.ctx.checkpoints.save(checkpoint).map_err(AppError::from)
    }

    fn run_bgm_detect(&self, job: &mut Job, checkpoint: &mut crate::domain::Checkpoint) -> Result<(), AppError> {
        let policy = job.settings.separation_policy;
        let total = checkpoint.segments.len().max(1) as f64;
        for (i, segment) in checkpoint.segments.iter_mut().enumerate() {
            let (samples, sample_rate) = self.ctx.transcoder.read_pcm(std::path::Path::new(&segment.file_path))?;
            let (level, _) = circuit_engine::analyze_musicality(
                &samples,
                sample_rate,
                self.ctx.circuit_config.musicality_light_threshold,
                self.ctx.circuit_config.musicality_heavy_threshold,
            );
            let tier = circuit_engine::resolve_initial_tier(policy, level, self.ctx.hardware);
            if tier != SeparationTier::None {
                segment.separation_tier = Some(tier);
                self.publish(
                    &job.id,
                    EventKind::Signal {
                        job_id: Some(job.id.clone()),
                        signal: SignalKind::BgmDetected { level: format!("{level:?}").to_lowercase() },
                    },
                );
                self.publish(
                    &job.id,
                    EventKind::Signal {
                        job_id: Some(job.id.clone()),
                        signal: SignalKind::SeparationStrategy { initial: tier },
                    },
                );
            }
            job.phase_progress = ((i + 1) as f64 / total) * 100.0;
        }
        Ok(())
    }

    fn run_transcribe(
        &self,
        job: &mut Job,
        checkpoint: &mut crate::domain::Checkpoint,
        circuit_state: &mut CircuitState,
        weights: &StageWeights,
    ) -> Result<bool, AppError> {
        let resume_from = checkpoint.first_unprocessed_index().unwrap_or(checkpoint.total_segments);
        for idx in resume_from..checkpoint.total_segments {
            if self.should_stop(job) {
                return Ok(false);
            }
            let history_len_before = circuit_state.history.len();
            let result = self.run_one_segment(job, checkpoint, circuit_state, idx)?;
            if circuit_state.history.len() > history_len_before || circuit_state.broken {
                checkpoint.problem_segments.insert(idx);
            }
            checkpoint.mark_processed(idx, result.clone());
            self.save(checkpoint)?;
            job.processed_segments = Some(checkpoint.processed_indices.len() as u32);

            let sentences: Vec<Sentence> = result
                .segments
                .iter()
                .map(|s| Sentence { text: s.text.clone(), start_ms: s.start_ms, end_ms: s.end_ms, confidence: 1.0, words: Vec::new() })
                .collect();
            self.publish(
                &job.id,
                EventKind::Fragment { job_id: job.id.clone(), segment_index: idx, sentences, language: result.language.clone() },
            );

            let phase_percent = ((idx + 1) as f64 / checkpoint.total_segments.max(1) as f64) * 100.0;
            self.report_progress(job, weights, phase_percent);

            if circuit_engine::should_break(circuit_state, &self.ctx.circuit_config) {
                circuit_state.broken = true;
                checkpoint.problem_segments.insert(idx);
                self.publish(
                    &job.id,
                    EventKind::Signal {
                        job_id: Some(job.id.clone()),
                        signal: SignalKind::CircuitBreak { action: format!("{:?}", job.settings.on_break_policy).to_lowercase() },
                    },
                );
                match job.settings.on_break_policy {
                    OnBreakPolicy::Continue => continue,
                    OnBreakPolicy::FallbackOriginal => {
                        for segment in checkpoint.segments.iter_mut().skip(idx as usize + 1) {
                            segment.separation_tier = None;
                        }
                        continue;
                    }
                    OnBreakPolicy::Fail | OnBreakPolicy::Pause => return Ok(true),
                }
            }
        }
        Ok(circuit_state.broken)
    }

    fn run_one_segment(
        &self,
        job: &mut Job,
        checkpoint: &mut crate::domain::Checkpoint,
        circuit_state: &mut CircuitState,
        idx: u32,
    ) -> Result<UnalignedResult, AppError> {
        let mut current_tier = checkpoint.segments[idx as usize].separation_tier.unwrap_or(SeparationTier::None);
        let mut use_fallback_recognizer = false;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let source_path = self.prepare_segment_audio(job, checkpoint, idx, current_tier)?;
            let model_id = if use_fallback_recognizer { "fallback" } else { &job.settings.model_id };
            let recognizer: &Arc<dyn Recognizer> =
                if use_fallback_recognizer { &self.ctx.fallback_recognizer } else { &self.ctx.primary_recognizer };
            let recognizer_kind = if use_fallback_recognizer { ModelKind::FallbackRecognizer } else { ModelKind::PrimaryRecognizer };
            let handle = self.ctx.models.acquire(recognizer_kind, model_id)?;
            let fragment = recognize_with_retry(recognizer.as_ref(), &source_path, model_id, TRANSIENT_RETRY_LIMIT);
            self.ctx.models.release(&handle);
            let fragment = fragment?;
            let confidence = fragment.confidence();
            job.detected_language = fragment.detected_language.clone().or(job.detected_language.take());

            let noise_tag_present = checkpoint.segments[idx as usize].separation_tier == Some(SeparationTier::Strong)
                || checkpoint.segments[idx as usize].separation_tier == Some(SeparationTier::Fallback);
            let decision = circuit_engine::evaluate(confidence, noise_tag_present, current_tier, &self.ctx.circuit_config.gate);
            circuit_engine::record_decision(circuit_state, idx, current_tier, &decision);

            match decision {
                FuseDecision::Accept { .. } => {
                    let sentences = crate::domain::split_into_sentences(&fragment, &self.ctx.sentence_config);
                    return Ok(UnalignedResult {
                        segment_index: idx,
                        language: fragment.detected_language,
                        segments: sentences
                            .into_iter()
                            .enumerate()
                            .map(|(i, s)| UnalignedSentence {
                                id: format!("{idx}-{i}"),
                                start_ms: s.start_ms,
                                end_ms: s.end_ms,
                                text: s.text,
                            })
                            .collect(),
                    });
                }
                FuseDecision::UpgradeSeparation { next_tier, rationale } => {
                    self.publish(
                        &job.id,
                        EventKind::Signal {
                            job_id: Some(job.id.clone()),
                            signal: SignalKind::ModelEscalated { from: current_tier, to: next_tier },
                        },
                    );
                    info!(job_id = %job.id, segment = idx, %rationale, "escalating separation tier");
                    current_tier = next_tier;
                    checkpoint.segments[idx as usize].separation_tier = Some(next_tier);
                    checkpoint.segments[idx as usize].separated = false;
                }
                FuseDecision::RecognizerRetry { rationale } => {
                    warn!(job_id = %job.id, segment = idx, %rationale, "recognizer retry");
                    if use_fallback_recognizer || attempts >= MAX_ESCALATIONS_PER_SEGMENT {
                        let sentences = crate::domain::split_into_sentences(&fragment, &self.ctx.sentence_config);
                        return Ok(UnalignedResult {
                            segment_index: idx,
                            language: fragment.detected_language,
                            segments: sentences
                                .into_iter()
                                .enumerate()
                                .map(|(i, s)| UnalignedSentence {
                                    id: format!("{idx}-{i}"),
                                    start_ms: s.start_ms,
                                    end_ms: s.end_ms,
                                    text: s.text,
                                })
                                .collect(),
                        });
                    }
                    use_fallback_recognizer = true;
                }
            }
        }
    }

    fn prepare_segment_audio(
        &self,
        _job: &Job,
        checkpoint: &mut crate::domain::Checkpoint,
        idx: u32,
        tier: SeparationTier,
    ) -> Result<std::path::PathBuf, AppError> {
        let segment = &mut checkpoint.segments[idx as usize];
        let original = std::path::PathBuf::from(&segment.file_path);
        if tier == SeparationTier::None {
            return Ok(original);
        }
        let tier_name = format!("{tier:?}").to_lowercase();
        let out_path = self.ctx.paths.dir.join("segments").join(format!("{idx}.{tier_name}.wav"));
        let handle = self.ctx.models.acquire(ModelKind::Separator, &tier_name)?;
        let result = self.ctx.separator.separate(&original, &tier_name, &out_path);
        self.ctx.models.release(&handle);
        result?;
        segment.separated = true;
        Ok(out_path)
    }

    fn run_align(&self, job: &mut Job, checkpoint: &mut crate::domain::Checkpoint, weights: &StageWeights) -> Result<(), AppError> {
        if !job.settings.word_level_timestamps && weights.align > 0.0 {
            let sentences: Vec<Sentence> = checkpoint
                .unaligned_results
                .iter()
                .flat_map(|r| r.segments.iter().map(|s| Sentence { text: s.text.clone(), start_ms: s.start_ms, end_ms: s.end_ms, confidence: 1.0, words: Vec::new() }))
                .collect();
            let handle = self.ctx.models.acquire(ModelKind::Aligner, "default")?;
            let aligned = self.ctx.aligner.align(&self.ctx.paths.audio_wav(), &sentences);
            self.ctx.models.release(&handle);
            let aligned = aligned?;
            let bytes = serde_json::to_vec_pretty(&aligned).map_err(|e| AppError::Internal(e.to_string()))?;
            std::fs::write(self.ctx.paths.aligned(), bytes)?;
            self.publish(&job.id, EventKind::Signal { job_id: Some(job.id.clone()), signal: SignalKind::AlignmentReady });
        }
        self.report_progress(job, weights, 100.0);
        Ok(())
    }

    fn run_render(&self, job: &mut Job, checkpoint: &crate::domain::Checkpoint) -> Result<(), AppError> {
        let suffix = &job.settings.problem_segment_suffix;
        let sentences: Vec<Sentence> = checkpoint
            .unaligned_results
            .iter()
            .flat_map(|r| {
                let marked = checkpoint.problem_segments.contains(&r.segment_index);
                r.segments.iter().map(move |s| {
                    let text = if marked { format!("{} {}", s.text, suffix) } else { s.text.clone() };
                    Sentence { text, start_ms: s.start_ms, end_ms: s.end_ms, confidence: 1.0, words: Vec::new() }
                })
            })
            .collect();
        let mut sorted = sentences;
        sorted.sort_by_key(|s| s.start_ms);
        let srt = crate::srt::render(&sorted);
        std::fs::write(self.ctx.paths.output_srt(), srt)?;
        job.output_subtitle_path = Some(self.ctx.paths.output_srt().display().to_string());
        Ok(())
    }
}

fn overall_percent(weights: &StageWeights, phase: JobPhase, phase_percent: f64) -> f64 {
    let weight_for = |p: JobPhase| -> f64 {
        match p {
            JobPhase::Extract => weights.extract,
            JobPhase::Split => weights.split,
            JobPhase::BgmDetect => weights.bgm_detect,
            JobPhase::Separate => 0.0,
            JobPhase::Transcribe => weights.transcribe,
            JobPhase::Align => weights.align,
            JobPhase::Render => weights.render,
            JobPhase::Complete => weights.complete,
        }
    };
    let mut completed = 0.0;
    for p in JobPhase::ORDER.iter().take(phase.index()) {
        completed += weight_for(*p);
    }
    completed += weight_for(phase) * (phase_percent / 100.0);
    (completed).clamp(0.0, 100.0)
}

fn default_weight_inputs(job: &Job) -> WeightInputs {
    WeightInputs {
        total_segments: job.total_segments.unwrap_or(0),
        segments_requiring_separation: 0,
        expected_retry_fraction: 0.0,
        alignment_used: !job.settings.word_level_timestamps,
    }
}

fn weight_inputs_from_checkpoint(job: &Job, checkpoint: &crate::domain::Checkpoint) -> WeightInputs {
    let requiring_separation =
        checkpoint.segments.iter().filter(|s| s.separation_tier.map(|t| t != SeparationTier::None).unwrap_or(false)).count() as u32;
    WeightInputs {
        total_segments: checkpoint.total_segments,
        segments_requiring_separation: requiring_separation,
        expected_retry_fraction: 0.1,
        alignment_used: !job.settings.word_level_timestamps,
    }
}

fn reject_settings_drift(original: &EngineSettings, requested: &EngineSettings) -> Result<(), AppError> {
    if original.model_id != requested.model_id || original.device != requested.device || original.compute_precision != requested.compute_precision {
        return Err(AppError::Validation(
            "restart requested with model-identity settings that differ from the checkpoint; use a fresh run instead".into(),
        ));
    }
    Ok(())
}

fn recognize_with_retry(
    recognizer: &dyn Recognizer,
    path: &std::path::Path,
    model_id: &str,
    max_attempts: u32,
) -> Result<crate::domain::TranscriptionFragment, AppError> {
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match recognizer.transcribe_segment(path, model_id) {
            Ok(fragment) => return Ok(fragment),
            Err(err) => {
                last_err = Some(err);
                std::thread::sleep(Duration::from_millis(50 * 2u64.pow(attempt)));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| AppError::Internal("recognizer retry loop exited without an error".into())))
}
