use serde::{Deserialize, Serialize};

use super::fragment::{TranscriptionFragment, Word};

/// Tunables for the sentence splitter (spec.md §3 "Sentence").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentenceSplitConfig {
    pub pause_threshold_ms: u64,
    pub hard_max_duration_ms: u64,
    pub max_chars: usize,
    pub min_chars: usize,
}

impl Default for SentenceSplitConfig {
    fn default() -> Self {
        SentenceSplitConfig {
            pause_threshold_ms: 700,
            hard_max_duration_ms: 12_000,
            max_chars: 84,
            min_chars: 1,
        }
    }
}

/// A user-facing subtitle unit produced by the sentence splitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
    pub words: Vec<Word>,
}

const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', '。', '!', '?', '…'];
const WEAK_PUNCTUATION: &[char] = &[',', ';', ':', '，', '、'];

fn ends_with_any(text: &str, marks: &[char]) -> bool {
    text.trim_end().chars().last().map(|c| marks.contains(&c)).unwrap_or(false)
}

struct Builder {
    words: Vec<Word>,
}

impl Builder {
    fn new() -> Self {
        Builder { words: Vec::new() }
    }

    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ")
    }

    fn duration_ms(&self) -> u64 {
        match (self.words.first(), self.words.last()) {
            (Some(first), Some(last)) => last.global_end_ms.saturating_sub(first.global_start_ms),
            _ => 0,
        }
    }

    fn finish(self) -> Option<Sentence> {
        if self.words.is_empty() {
            return None;
        }
        let text = self.text();
        let start_ms = self.words.first().unwrap().global_start_ms;
        let end_ms = self.words.last().unwrap().global_end_ms;
        let confidence =
            self.words.iter().map(|w| w.confidence).sum::<f64>() / self.words.len() as f64;
        Some(Sentence { text, start_ms, end_ms, confidence, words: self.words })
    }
}

/// Splits a recognized fragment's words into sentences per spec.md §3:
/// split at terminal punctuation, at an inter-word gap exceeding the pause
/// threshold, or when duration/length hits a hard cap; sentences shorter
/// than `min_chars` are dropped.
pub fn split_into_sentences(
    fragment: &TranscriptionFragment,
    config: &SentenceSplitConfig,
) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut current = Builder::new();
    let mut prev_end_ms: Option<u64> = None;
    // Index (within `current.words`) of the last word seen so far that ends
    // a weak-punctuation clause. Hitting a hard cap prefers splitting here
    // over letting the sentence run past `max_chars`.
    let mut weak_split_at: Option<usize> = None;

    for word in &fragment.words {
        let gap_forces_split = match prev_end_ms {
            Some(prev) if word.global_start_ms > prev => {
                word.global_start_ms - prev > config.pause_threshold_ms
            }
            _ => false,
        };
        if gap_forces_split && !current.is_empty() {
            if let Some(s) = current.finish() {
                sentences.push(s);
            }
            current = Builder::new();
            weak_split_at = None;
        }

        current.words.push(word.clone());
        prev_end_ms = Some(word.global_end_ms);

        if weak_split_available(&current.words.last().unwrap().text) {
            weak_split_at = Some(current.words.len() - 1);
        }

        let terminal = ends_with_any(&current.words.last().unwrap().text, TERMINAL_PUNCTUATION);
        if terminal {
            if let Some(s) = current.finish() {
                sentences.push(s);
            }
            current = Builder::new();
            weak_split_at = None;
            continue;
        }

        let over_duration = current.duration_ms() >= config.hard_max_duration_ms;
        let over_chars = current.text().chars().count() >= config.max_chars;
        if over_duration || over_chars {
            if let Some(idx) = weak_split_at.filter(|&idx| idx + 1 < current.words.len()) {
                let tail = current.words.split_off(idx + 1);
                if let Some(s) = current.finish() {
                    sentences.push(s);
                }
                current = Builder { words: tail };
                weak_split_at = None;
                continue;
            }
            if let Some(s) = current.finish() {
                sentences.push(s);
            }
            current = Builder::new();
            weak_split_at = None;
        }
    }
    if let Some(s) = current.finish() {
        sentences.push(s);
    }

    sentences.retain(|s| s.text.trim().chars().count() >= config.min_chars);
    sentences
}

fn weak_split_available(text: &str) -> bool {
    ends_with_any(text, WEAK_PUNCTUATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(start: u64, end: u64, text: &str) -> Word {
        Word { local_id: 0, global_start_ms: start, global_end_ms: end, text: text.into(), confidence: 0.9 }
    }

    #[test]
    fn splits_at_terminal_punctuation() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: Some("en".into()),
            words: vec![
                word(0, 500, "Hello."),
                word(600, 1000, "World."),
            ],
        };
        let sentences = split_into_sentences(&frag, &SentenceSplitConfig::default());
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Hello.");
        assert_eq!(sentences[1].text, "World.");
    }

    #[test]
    fn splits_on_pause_gap() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![
                word(0, 500, "one"),
                word(2_000, 2_500, "two"),
            ],
        };
        let config = SentenceSplitConfig { pause_threshold_ms: 700, ..Default::default() };
        let sentences = split_into_sentences(&frag, &config);
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn drops_sentences_shorter_than_min_chars() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![word(0, 100, ".")],
        };
        let config = SentenceSplitConfig { min_chars: 2, ..Default::default() };
        let sentences = split_into_sentences(&frag, &config);
        assert!(sentences.is_empty());
    }

    #[test]
    fn prefers_a_weak_punctuation_split_over_running_past_max_chars() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![
                word(0, 100, "Well,"),
                word(100, 200, "there"),
                word(200, 300, "now"),
            ],
        };
        let config = SentenceSplitConfig { max_chars: 12, ..Default::default() };
        let sentences = split_into_sentences(&frag, &config);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Well,");
        assert_eq!(sentences[1].text, "there now");
    }

    #[test]
    fn exceeds_max_chars_when_no_weak_punctuation_split_is_available() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![
                word(0, 100, "well"),
                word(100, 200, "there"),
                word(200, 300, "now"),
            ],
        };
        let config = SentenceSplitConfig { max_chars: 12, ..Default::default() };
        let sentences = split_into_sentences(&frag, &config);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "well there now");
    }

    #[test]
    fn sentences_are_sorted_and_non_overlapping() {
        let frag = TranscriptionFragment {
            segment_index: 0,
            detected_language: None,
            words: vec![
                word(0, 500, "Hello."),
                word(600, 1200, "This is a test."),
            ],
        };
        let sentences = split_into_sentences(&frag, &SentenceSplitConfig::default());
        for w in sentences.windows(2) {
            assert!(w[0].end_ms <= w[1].start_ms);
        }
    }
}
