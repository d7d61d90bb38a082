use std::path::{Path, PathBuf};
use std::sync::Mutex;

use subcontrol::domain::{Segment, Sentence, TranscriptionFragment, Word};
use subcontrol::error::AppError;
use subcontrol::pipeline::{Aligner, Recognizer, Separator, Transcoder};

/// Transcoder stand-in: `extract_audio`/`split_segments` never touch disk,
/// `read_pcm` returns a fixed buffer of silence so the BGM-detection stage
/// always resolves to `SeparationTier::None` for these scenarios.
pub struct FakeTranscoder {
    pub segments: Vec<Segment>,
}

impl Transcoder for FakeTranscoder {
    fn extract_audio(&self, _input_media_path: &Path, _out_wav_path: &Path) -> Result<(), AppError> {
        Ok(())
    }

    fn split_segments(&self, _wav_path: &Path, _out_dir: &Path) -> Result<Vec<Segment>, AppError> {
        Ok(self.segments.clone())
    }

    fn read_pcm(&self, _wav_path: &Path) -> Result<(Vec<i16>, u32), AppError> {
        Ok((vec![0i16; 1600], 16_000))
    }
}

pub fn flat_segments(count: u32, duration_ms: u64) -> Vec<Segment> {
    (0..count)
        .map(|i| Segment {
            index: i,
            start_ms: i as u64 * duration_ms,
            end_ms: (i as u64 + 1) * duration_ms,
            file_path: format!("segments/{i}.wav"),
            separated: false,
            separation_tier: None,
        })
        .collect()
}

/// Recognizer stand-in that always reports the same confidence, with text
/// derived from the segment path so each segment's transcript is distinct.
pub struct FixedConfidenceRecognizer {
    pub confidence: f64,
}

impl Recognizer for FixedConfidenceRecognizer {
    fn transcribe_segment(&self, segment_wav_path: &Path, model_id: &str) -> Result<TranscriptionFragment, AppError> {
        let label = segment_wav_path.display().to_string();
        Ok(TranscriptionFragment {
            segment_index: 0,
            detected_language: Some("en".to_string()),
            words: vec![Word {
                local_id: 0,
                global_start_ms: 0,
                global_end_ms: 1000,
                text: format!("{model_id}:{label}"),
                confidence: self.confidence,
            }],
        })
    }
}

/// Recognizer stand-in whose confidence is scripted per call, in order, so a
/// test can force a specific escalation/retry sequence. Panics if called
/// more times than scripted confidences are available.
pub struct ScriptedRecognizer {
    confidences: Mutex<Vec<f64>>,
}

impl ScriptedRecognizer {
    pub fn new(confidences: Vec<f64>) -> Self {
        ScriptedRecognizer { confidences: Mutex::new(confidences) }
    }
}

impl Recognizer for ScriptedRecognizer {
    fn transcribe_segment(&self, _segment_wav_path: &Path, model_id: &str) -> Result<TranscriptionFragment, AppError> {
        let mut confidences = self.confidences.lock().unwrap_or_else(|e| e.into_inner());
        let confidence = if confidences.is_empty() { 0.99 } else { confidences.remove(0) };
        Ok(TranscriptionFragment {
            segment_index: 0,
            detected_language: Some("en".to_string()),
            words: vec![Word { local_id: 0, global_start_ms: 0, global_end_ms: 1000, text: model_id.to_string(), confidence }],
        })
    }
}

pub struct PassthroughAligner;

impl Aligner for PassthroughAligner {
    fn align(&self, _wav_path: &Path, sentences: &[Sentence]) -> Result<Vec<Sentence>, AppError> {
        Ok(sentences.to_vec())
    }
}

pub struct CopySeparator;

impl Separator for CopySeparator {
    fn separate(&self, _segment_wav_path: &Path, _tier: &str, out_wav_path: &Path) -> Result<(), AppError> {
        if let Some(parent) = out_wav_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out_wav_path, b"")?;
        Ok(())
    }
}

pub fn job_dir(root: &Path, job_id: &str) -> PathBuf {
    root.join("jobs").join(job_id)
}
