//! Default trait-object implementations for the pipeline/media-supervisor
//! seams. Real speech recognition, alignment, and source separation models
//! are out of scope (spec.md §1) — those three stay deterministic stand-ins,
//! the same role `models::NoopLoader` plays for model loading. Audio
//! extraction, segmentation, and derived media are real ffmpeg/ffprobe work
//! and are grounded in the teacher's blocking-subprocess idiom
//! (`transcoding::engine::process_transcode_job`).

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::domain::{
    ArtifactKind, Segment, Sentence, TranscriptionFragment, Word, SEGMENT_TARGET_DURATION_MS,
};
use crate::error::AppError;
use crate::media_supervisor::ArtifactGenerator;
use crate::persistence::JobPaths;
use crate::pipeline::{run_external_tool, Aligner, Recognizer, Separator, Transcoder};

fn ffprobe_duration_ms(ffprobe_path: &str, media_path: &Path) -> Result<u64, AppError> {
    let stdout = run_external_tool(
        ffprobe_path,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            &media_path.display().to_string(),
        ],
    )?;
    let text = String::from_utf8_lossy(&stdout);
    let seconds: f64 = text.trim().parse().map_err(|_| AppError::ExternalTool(format!("unparsable ffprobe duration: {text}")))?;
    Ok((seconds * 1000.0).round() as u64)
}

/// Shells out to ffmpeg/ffprobe for extraction and fixed-window
/// segmentation. Voice-activity detection is out of scope (spec.md §1), so
/// segment boundaries fall on a fixed `SEGMENT_TARGET_DURATION_MS` grid
/// instead of speech boundaries.
pub struct FfmpegTranscoder {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Transcoder for FfmpegTranscoder {
    fn extract_audio(&self, input_media_path: &Path, out_wav_path: &Path) -> Result<(), AppError> {
        if let Some(parent) = out_wav_path.parent() {
            fs::create_dir_all(parent)?;
        }
        run_external_tool(
            &self.ffmpeg_path,
            &[
                "-y",
                "-i",
                &input_media_path.display().to_string(),
                "-ac",
                "1",
                "-ar",
                "16000",
                "-f",
                "wav",
                &out_wav_path.display().to_string(),
            ],
        )?;
        Ok(())
    }

    fn split_segments(&self, wav_path: &Path, out_dir: &Path) -> Result<Vec<Segment>, AppError> {
        fs::create_dir_all(out_dir)?;
        let total_ms = ffprobe_duration_ms(&self.ffprobe_path, wav_path)?;
        let mut segments = Vec::new();
        let mut index = 0u32;
        let mut start_ms = 0u64;
        while start_ms < total_ms {
            let end_ms = (start_ms + SEGMENT_TARGET_DURATION_MS).min(total_ms);
            let file_path = out_dir.join(format!("{index}.wav"));
            run_external_tool(
                &self.ffmpeg_path,
                &[
                    "-y",
                    "-ss",
                    &format!("{:.3}", start_ms as f64 / 1000.0),
                    "-to",
                    &format!("{:.3}", end_ms as f64 / 1000.0),
                    "-i",
                    &wav_path.display().to_string(),
                    &file_path.display().to_string(),
                ],
            )?;
            segments.push(Segment {
                index,
                start_ms,
                end_ms,
                file_path: file_path.display().to_string(),
                separated: false,
                separation_tier: None,
            });
            start_ms = end_ms;
            index += 1;
        }
        Ok(segments)
    }

    fn read_pcm(&self, wav_path: &Path) -> Result<(Vec<i16>, u32), AppError> {
        let bytes = fs::read(wav_path)?;
        parse_pcm16_wav(&bytes)
    }
}

/// Minimal RIFF/WAVE parser for the 16-bit PCM mono files this pipeline
/// produces itself (spec.md §4.4 step 1 input). Anything exotic (extended
/// fmt chunks, float PCM) is rejected rather than guessed at.
fn parse_pcm16_wav(bytes: &[u8]) -> Result<(Vec<i16>, u32), AppError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AppError::ExternalTool("not a RIFF/WAVE file".into()));
    }
    let mut sample_rate = 0u32;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let body_start = pos + 8;
        if chunk_id == b"fmt " && body_start + 16 <= bytes.len() {
            sample_rate = u32::from_le_bytes(bytes[body_start + 4..body_start + 8].try_into().unwrap());
        }
        if chunk_id == b"data" {
            let body_end = (body_start + chunk_size).min(bytes.len());
            let samples = bytes[body_start..body_end]
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            return Ok((samples, sample_rate.max(1)));
        }
        pos = body_start + chunk_size + (chunk_size % 2);
    }
    Err(AppError::ExternalTool("wav file has no data chunk".into()))
}

/// Deterministic stand-in recognizer: real ASR models are out of scope
/// (spec.md §1). Emits a single low-confidence word spanning the segment so
/// the pipeline's confidence gate and escalation logic have something real
/// to react to end to end.
pub struct StubRecognizer {
    pub confidence: f64,
}

impl Recognizer for StubRecognizer {
    fn transcribe_segment(&self, segment_wav_path: &Path, model_id: &str) -> Result<TranscriptionFragment, AppError> {
        let _ = segment_wav_path;
        Ok(TranscriptionFragment {
            segment_index: 0,
            detected_language: Some("und".to_string()),
            words: vec![Word {
                local_id: 0,
                global_start_ms: 0,
                global_end_ms: 0,
                text: format!("[{model_id}]"),
                confidence: self.confidence,
            }],
        })
    }
}

/// Word-level timing is already present on `Sentence` from the recognizer
/// stand-in, so this aligner is a pass-through. A real forced-aligner plugs
/// in at this seam (spec.md §9 open question).
pub struct PassthroughAligner;

impl Aligner for PassthroughAligner {
    fn align(&self, wav_path: &Path, sentences: &[Sentence]) -> Result<Vec<Sentence>, AppError> {
        let _ = wav_path;
        Ok(sentences.to_vec())
    }
}

/// Vocal separation model is out of scope (spec.md §1); copies the input
/// through unchanged so the pipeline stage still produces a usable file at
/// every tier.
pub struct CopySeparator;

impl Separator for CopySeparator {
    fn separate(&self, segment_wav_path: &Path, tier: &str, out_wav_path: &Path) -> Result<(), AppError> {
        let _ = tier;
        if let Some(parent) = out_wav_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(segment_wav_path, out_wav_path)?;
        Ok(())
    }
}

/// Generates derived editor media by shelling out to ffmpeg, grounded in
/// the teacher's `generate_preview_for_video`/`build_ffmpeg_args` shape.
pub struct FfmpegArtifactGenerator {
    pub ffmpeg_path: String,
}

impl FfmpegArtifactGenerator {
    fn proxy(&self, input: &Path, out: &Path, width: u32) -> Result<(), AppError> {
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        run_external_tool(
            &self.ffmpeg_path,
            &[
                "-y",
                "-i",
                &input.display().to_string(),
                "-vf",
                &format!("scale={width}:-2"),
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-c:a",
                "aac",
                &out.display().to_string(),
            ],
        )?;
        Ok(())
    }
}

impl ArtifactGenerator for FfmpegArtifactGenerator {
    fn generate(&self, kind: ArtifactKind, input_media_path: &Path, paths: &JobPaths) -> Result<(), AppError> {
        match kind {
            ArtifactKind::Source => Ok(()),
            ArtifactKind::AudioWav => {
                if let Some(parent) = paths.audio_wav().parent() {
                    fs::create_dir_all(parent)?;
                }
                run_external_tool(
                    &self.ffmpeg_path,
                    &["-y", "-i", &input_media_path.display().to_string(), "-ac", "1", "-ar", "16000", &paths.audio_wav().display().to_string()],
                )?;
                Ok(())
            }
            ArtifactKind::Peaks => {
                let (samples, _rate) = parse_pcm16_wav(&fs::read(paths.audio_wav())?)?;
                let bucket = (samples.len() / 1000).max(1);
                let peaks: Vec<i16> = samples.chunks(bucket).map(|c| c.iter().copied().map(i16::abs).max().unwrap_or(0)).collect();
                fs::write(paths.peaks(), serde_json::to_vec(&peaks).map_err(|e| AppError::Internal(e.to_string()))?)?;
                Ok(())
            }
            ArtifactKind::PreviewProxy360p => self.proxy(input_media_path, &paths.proxy_360p(), 640),
            ArtifactKind::Proxy720p => self.proxy(input_media_path, &paths.proxy_720p(), 1280),
            ArtifactKind::Thumbnails => {
                if let Some(parent) = paths.thumbs_jpg().parent() {
                    fs::create_dir_all(parent)?;
                }
                run_external_tool(
                    &self.ffmpeg_path,
                    &[
                        "-y",
                        "-i",
                        &input_media_path.display().to_string(),
                        "-vf",
                        "fps=1/10,scale=160:-1,tile=10x10",
                        "-frames:v",
                        "1",
                        &paths.thumbs_jpg().display().to_string(),
                    ],
                )?;
                let tiles: Vec<serde_json::Value> = (0..100)
                    .map(|i| serde_json::json!({"index": i, "col": i % 10, "row": i / 10}))
                    .collect();
                fs::write(paths.thumbs_json(), serde_json::to_vec(&tiles).map_err(|e| AppError::Internal(e.to_string()))?)?;
                Ok(())
            }
        }
    }
}

pub fn external_tool_available(program: &str) -> bool {
    Command::new(program).arg("-version").stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).status().is_ok()
}
