//! SRT subtitle codec (spec.md §6: "Standard numbered blocks; timestamps
//! `HH:MM:SS,mmm`; blank line separators; UTF-8 with no BOM"). SRT is the
//! only export format in scope (spec.md §1) — VTT/TXT/JSON writers are not
//! implemented here.

use crate::domain::Sentence;
use crate::error::AppError;

fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

fn parse_timestamp(text: &str) -> Option<u64> {
    let (hms, millis) = text.split_once(',')?;
    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let millis: u64 = millis.parse().ok()?;
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Renders time-sorted sentences as an SRT document. Callers are expected
/// to have already sorted `sentences` by `start_ms`.
pub fn render(sentences: &[Sentence]) -> String {
    let mut out = String::new();
    for (i, sentence) in sentences.iter().enumerate() {
        out.push_str(&(i + 1).to_string());
        out.push('\n');
        out.push_str(&format_timestamp(sentence.start_ms));
        out.push_str(" --> ");
        out.push_str(&format_timestamp(sentence.end_ms));
        out.push('\n');
        out.push_str(sentence.text.trim());
        out.push_str("\n\n");
    }
    out
}

/// Parses an SRT document back into the canonical sentence form (spec.md §8
/// round-trip property: "any SRT is parseable back ... with bit-identical
/// timings"). Word-level timing is not recoverable from SRT and is left
/// empty.
pub fn parse(document: &str) -> Result<Vec<Sentence>, AppError> {
    let mut sentences = Vec::new();
    let normalized = document.replace("\r\n", "\n");
    for block in normalized.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let mut lines = block.lines();
        let _index = lines.next().ok_or_else(|| AppError::Validation("srt block missing index line".into()))?;
        let timing = lines.next().ok_or_else(|| AppError::Validation("srt block missing timing line".into()))?;
        let (start_text, end_text) = timing
            .split_once(" --> ")
            .ok_or_else(|| AppError::Validation(format!("malformed srt timing line: {timing}")))?;
        let start_ms = parse_timestamp(start_text.trim())
            .ok_or_else(|| AppError::Validation(format!("malformed srt timestamp: {start_text}")))?;
        let end_ms = parse_timestamp(end_text.trim())
            .ok_or_else(|| AppError::Validation(format!("malformed srt timestamp: {end_text}")))?;
        let text = lines.collect::<Vec<_>>().join("\n");
        sentences.push(Sentence { text, start_ms, end_ms, confidence: 1.0, words: Vec::new() });
    }
    Ok(sentences)
}
