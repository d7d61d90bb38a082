//! C4: Circuit / Escalation Engine — spectral pre-judgment, separation tier
//! resolution, the confidence gate, and the per-job circuit breaker
//! (spec.md §4.4).

mod decision;
mod musicality;
mod tiers;

pub use decision::{evaluate, GateConfig};
pub use musicality::analyze as analyze_musicality;
pub use tiers::resolve_initial_tier;

use crate::domain::{CircuitState, FuseDecision, ModelChangeEntry, SeparationTier};

/// Bundles the gate thresholds and musicality cutoffs so the pipeline runner
/// only needs to thread one value through the per-segment loop.
#[derive(Debug, Clone, Copy)]
pub struct CircuitEngineConfig {
    pub gate: GateConfig,
    pub musicality_light_threshold: f64,
    pub musicality_heavy_threshold: f64,
}

impl Default for CircuitEngineConfig {
    fn default() -> Self {
        CircuitEngineConfig {
            gate: GateConfig::default(),
            musicality_light_threshold: 0.35,
            musicality_heavy_threshold: 0.65,
        }
    }
}

/// Folds a freshly-evaluated `FuseDecision` into a job's running
/// `CircuitState` (spec.md §4.4 step 5 counters). Call once per decision,
/// after `evaluate` and before deciding whether to re-run the segment.
pub fn record_decision(state: &mut CircuitState, segment_index: u32, current_tier: SeparationTier, decision: &FuseDecision) {
    match decision {
        FuseDecision::Accept { .. } => {
            state.total_processed += 1;
            state.consecutive_low_confidence = 0;
        }
        FuseDecision::UpgradeSeparation { rationale, next_tier } => {
            state.escalation_count += 1;
            state.consecutive_low_confidence += 1;
            state.applied_tiers.insert(segment_index, *next_tier);
            state.history.push(ModelChangeEntry {
                segment_index,
                from_tier: current_tier,
                to_tier: *next_tier,
                reason: rationale.clone(),
            });
        }
        FuseDecision::RecognizerRetry { .. } => {
            state.total_processed += 1;
            state.total_retries += 1;
            state.consecutive_low_confidence += 1;
        }
    }
}

/// Wraps `CircuitState::should_break` with this engine's configured
/// thresholds (spec.md §4.4 step 5).
pub fn should_break(state: &CircuitState, config: &CircuitEngineConfig) -> bool {
    state.should_break(config.gate.consecutive_threshold, config.gate.ratio_threshold, config.gate.min_processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MusicalityLevel;

    #[test]
    fn escalation_then_repeated_retries_trips_the_breaker() {
        let config = CircuitEngineConfig::default();
        let mut state = CircuitState::default();

        let escalate = evaluate(0.1, false, SeparationTier::None, &config.gate);
        record_decision(&mut state, 0, SeparationTier::None, &escalate);
        assert!(matches!(escalate, FuseDecision::UpgradeSeparation { .. }));

        for idx in 1..=5 {
            let decision = evaluate(0.1, false, SeparationTier::Fallback, &config.gate);
            record_decision(&mut state, idx, SeparationTier::Fallback, &decision);
        }

        assert!(should_break(&state, &config));
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn accepted_segments_reset_the_consecutive_counter() {
        let config = CircuitEngineConfig::default();
        let mut state = CircuitState::default();
        let retry = evaluate(0.1, false, SeparationTier::Fallback, &config.gate);
        record_decision(&mut state, 0, SeparationTier::Fallback, &retry);
        assert_eq!(state.consecutive_low_confidence, 1);

        let accept = evaluate(0.95, false, SeparationTier::Fallback, &config.gate);
        record_decision(&mut state, 1, SeparationTier::Fallback, &accept);
        assert_eq!(state.consecutive_low_confidence, 0);
    }

    #[test]
    fn default_thresholds_classify_silence_as_no_separation_needed() {
        let config = CircuitEngineConfig::default();
        let samples = vec![0i16; 4096];
        let (level, should_separate) =
            analyze_musicality(&samples, 16_000, config.musicality_light_threshold, config.musicality_heavy_threshold);
        assert_eq!(level, MusicalityLevel::None);
        assert!(!should_separate);
    }
}
