use serde::{Deserialize, Serialize};

use super::circuit::SeparationTier;

/// A VAD-produced chunk of source audio (spec.md §3 "Segment").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub file_path: String,
    pub separated: bool,
    pub separation_tier: Option<SeparationTier>,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Hard cap on segment duration (spec.md §3).
pub const SEGMENT_MAX_DURATION_MS: u64 = 30_000;
/// Target segment duration (spec.md §3).
pub const SEGMENT_TARGET_DURATION_MS: u64 = 15_000;

/// Validates the non-overlapping, sorted, duration-capped invariants a set
/// of segments produced by the split stage must satisfy.
pub fn segments_are_valid(segments: &[Segment]) -> bool {
    let mut prev_end: Option<u64> = None;
    for (i, seg) in segments.iter().enumerate() {
        if seg.index as usize != i {
            return false;
        }
        if seg.start_ms >= seg.end_ms {
            return false;
        }
        if seg.duration_ms() > SEGMENT_MAX_DURATION_MS {
            return false;
        }
        if let Some(prev) = prev_end {
            if seg.start_ms < prev {
                return false;
            }
        }
        prev_end = Some(seg.end_ms);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(index: u32, start_ms: u64, end_ms: u64) -> Segment {
        Segment {
            index,
            start_ms,
            end_ms,
            file_path: format!("segments/{index}.wav"),
            separated: false,
            separation_tier: None,
        }
    }

    #[test]
    fn accepts_sorted_non_overlapping_segments() {
        let segs = vec![seg(0, 0, 10_000), seg(1, 10_000, 20_000)];
        assert!(segments_are_valid(&segs));
    }

    #[test]
    fn rejects_overlapping_segments() {
        let segs = vec![seg(0, 0, 10_000), seg(1, 5_000, 15_000)];
        assert!(!segments_are_valid(&segs));
    }

    #[test]
    fn rejects_segment_over_hard_cap() {
        let segs = vec![seg(0, 0, 31_000)];
        assert!(!segments_are_valid(&segs));
    }
}
