use std::path::Path;
use std::process::{Command, Stdio};

use crate::domain::{Segment, Sentence, TranscriptionFragment};
use crate::error::AppError;

/// Extracts a mono PCM track from the source media and performs VAD-based
/// segmentation (spec.md §4.5 `extract`/`split` stages). The actual codec
/// and VAD model are out of scope (spec.md §1) — this trait is the seam a
/// real backend plugs into.
pub trait Transcoder: Send + Sync {
    fn extract_audio(&self, input_media_path: &Path, out_wav_path: &Path) -> Result<(), AppError>;
    fn split_segments(&self, wav_path: &Path, out_dir: &Path) -> Result<Vec<Segment>, AppError>;

    /// Decodes 16-bit mono PCM samples for the spectral pre-judgment step
    /// (spec.md §4.4 step 1). Real decoding is out of scope (spec.md §1);
    /// implementations typically shell out to the same tool used for
    /// extraction.
    fn read_pcm(&self, wav_path: &Path) -> Result<(Vec<i16>, u32), AppError>;
}

/// Produces a `TranscriptionFragment` for one segment. The pipeline runner
/// holds both a primary and a fallback recognizer handle (spec.md §4.4 step
/// 4's `recognizer_retry`).
pub trait Recognizer: Send + Sync {
    fn transcribe_segment(&self, segment_wav_path: &Path, model_id: &str) -> Result<TranscriptionFragment, AppError>;
}

/// Produces word-level timing for sentences whose recognizer did not emit
/// reliable word timestamps natively (spec.md §4.5 `align` stage, spec.md
/// §9 open question).
pub trait Aligner: Send + Sync {
    fn align(&self, wav_path: &Path, sentences: &[Sentence]) -> Result<Vec<Sentence>, AppError>;
}

/// Isolates vocals from background music/noise at a given tier (spec.md §3
/// GLOSSARY "Separation").
pub trait Separator: Send + Sync {
    fn separate(&self, segment_wav_path: &Path, tier: &str, out_wav_path: &Path) -> Result<(), AppError>;
}

/// Runs an external tool as a child process with piped stdio, grounded in
/// the blocking subprocess idiom the underlying transcoding engine uses for
/// ffmpeg: spawn, capture stderr for diagnostics, wait, map a non-zero exit
/// code to an `AppError::ExternalTool`.
pub fn run_external_tool(program: &str, args: &[&str]) -> Result<Vec<u8>, AppError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| AppError::ExternalTool(format!("failed to spawn {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::ExternalTool(format!("{program} exited with {}: {stderr}", output.status)));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_external_tool_surfaces_nonzero_exit_as_external_tool_error() {
        let result = run_external_tool("false", &[]);
        assert!(matches!(result, Err(AppError::ExternalTool(_))));
    }

    #[test]
    fn run_external_tool_surfaces_missing_binary_as_external_tool_error() {
        let result = run_external_tool("definitely-not-a-real-binary-xyz", &[]);
        assert!(matches!(result, Err(AppError::ExternalTool(_))));
    }
}
