use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Output of the spectral pre-judgment step (spec.md §4.4 step 1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MusicalityLevel {
    None,
    Light,
    Heavy,
}

/// Separation tier, ordered `none < weak < strong < fallback` — escalation
/// is a non-decreasing walk over this chain (spec.md §8, GLOSSARY).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SeparationTier {
    None,
    Weak,
    Strong,
    Fallback,
}

impl SeparationTier {
    pub fn escalate(self) -> Option<SeparationTier> {
        match self {
            SeparationTier::None => Some(SeparationTier::Weak),
            SeparationTier::Weak => Some(SeparationTier::Strong),
            SeparationTier::Strong => Some(SeparationTier::Fallback),
            SeparationTier::Fallback => None,
        }
    }
}

/// One entry in the ordered history of model/tier changes for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelChangeEntry {
    pub segment_index: u32,
    pub from_tier: SeparationTier,
    pub to_tier: SeparationTier,
    pub reason: String,
}

/// Per-job circuit-breaker bookkeeping (spec.md §3 "Circuit State").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CircuitState {
    pub consecutive_low_confidence: u32,
    pub total_processed: u32,
    pub total_retries: u32,
    pub escalation_count: u32,
    pub applied_tiers: HashMap<u32, SeparationTier>,
    pub history: Vec<ModelChangeEntry>,
    pub broken: bool,
}

impl CircuitState {
    pub fn retry_ratio(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.total_retries as f64 / self.total_processed as f64
        }
    }

    /// Trips when `consecutive >= consecutive_threshold` or
    /// `ratio >= ratio_threshold` after at least `min_processed` segments
    /// (spec.md §4.4 step 5, default thresholds 3 / 0.2 / 5).
    pub fn should_break(&self, consecutive_threshold: u32, ratio_threshold: f64, min_processed: u32) -> bool {
        if self.total_processed < min_processed {
            return false;
        }
        self.consecutive_low_confidence >= consecutive_threshold || self.retry_ratio() >= ratio_threshold
    }
}

/// The per-segment decision emitted by the confidence gate (spec.md §3 "Fuse Decision").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FuseDecision {
    Accept { rationale: String },
    UpgradeSeparation { rationale: String, next_tier: SeparationTier },
    RecognizerRetry { rationale: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_chain_is_non_decreasing() {
        assert_eq!(SeparationTier::None.escalate(), Some(SeparationTier::Weak));
        assert_eq!(SeparationTier::Weak.escalate(), Some(SeparationTier::Strong));
        assert_eq!(SeparationTier::Strong.escalate(), Some(SeparationTier::Fallback));
        assert_eq!(SeparationTier::Fallback.escalate(), None);
        assert!(SeparationTier::None < SeparationTier::Weak);
        assert!(SeparationTier::Weak < SeparationTier::Strong);
        assert!(SeparationTier::Strong < SeparationTier::Fallback);
    }

    #[test]
    fn circuit_breaks_on_consecutive_threshold() {
        let mut state = CircuitState::default();
        state.total_processed = 5;
        state.consecutive_low_confidence = 3;
        assert!(state.should_break(3, 0.2, 5));
    }

    #[test]
    fn circuit_does_not_break_before_min_processed() {
        let mut state = CircuitState::default();
        state.total_processed = 2;
        state.consecutive_low_confidence = 10;
        assert!(!state.should_break(3, 0.2, 5));
    }

    #[test]
    fn circuit_breaks_on_ratio_threshold() {
        let mut state = CircuitState::default();
        state.total_processed = 10;
        state.total_retries = 3;
        assert!(state.should_break(99, 0.2, 5));
    }
}
