use serde::{Deserialize, Serialize};

/// One recognized word with optional per-word timing (spec.md §3 "Transcription Fragment").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub local_id: u32,
    pub global_start_ms: u64,
    pub global_end_ms: u64,
    pub text: String,
    pub confidence: f64,
}

/// A recognizer's structured output for one segment, before sentence splitting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionFragment {
    pub segment_index: u32,
    pub detected_language: Option<String>,
    pub words: Vec<Word>,
}

impl TranscriptionFragment {
    /// Aggregated confidence — mean of word confidences, 1.0 for an empty fragment.
    pub fn confidence(&self) -> f64 {
        if self.words.is_empty() {
            return 1.0;
        }
        self.words.iter().map(|w| w.confidence).sum::<f64>() / self.words.len() as f64
    }

    /// Words must be time-sorted (spec.md §3 invariant).
    pub fn words_are_time_sorted(&self) -> bool {
        self.words.windows(2).all(|w| w[0].global_start_ms <= w[1].global_start_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(start: u64, end: u64, conf: f64) -> Word {
        Word {
            local_id: 0,
            global_start_ms: start,
            global_end_ms: end,
            text: "hi".into(),
            confidence: conf,
        }
    }

    #[test]
    fn confidence_is_mean_of_words() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![word(0, 100, 0.5), word(100, 200, 1.0)],
        };
        assert!((frag.confidence() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn detects_out_of_order_words() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![word(100, 200, 1.0), word(0, 100, 1.0)],
        };
        assert!(!frag.words_are_time_sorted());
    }
}
