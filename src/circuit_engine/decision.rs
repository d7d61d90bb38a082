use crate::domain::{FuseDecision, SeparationTier};

/// Thresholds driving the confidence gate and circuit breaker (spec.md §4.4
/// steps 4-5). Kept configurable rather than hard-coded per spec.md §9's
/// open question about musicality/threshold tuning.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub accept_threshold: f64,
    pub upgrade_threshold: f64,
    pub consecutive_threshold: u32,
    pub ratio_threshold: f64,
    pub min_processed: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            accept_threshold: 0.6,
            upgrade_threshold: 0.4,
            consecutive_threshold: 3,
            ratio_threshold: 0.2,
            min_processed: 5,
        }
    }
}

/// Confidence gate (spec.md §4.4 step 4). Separation upgrade is always tried
/// before a recognizer retry, so the fallback recognizer is never asked to
/// fight noise a separator could have removed.
pub fn evaluate(
    confidence: f64,
    noise_tag_present: bool,
    current_tier: SeparationTier,
    config: &GateConfig,
) -> FuseDecision {
    if confidence >= config.accept_threshold {
        return FuseDecision::Accept {
            rationale: format!("confidence {confidence:.2} >= accept threshold {:.2}", config.accept_threshold),
        };
    }

    if noise_tag_present {
        if let Some(next_tier) = current_tier.escalate() {
            return FuseDecision::UpgradeSeparation {
                rationale: "noise event tag present and a separation rung remains".into(),
                next_tier,
            };
        }
    }

    if confidence < config.upgrade_threshold {
        if let Some(next_tier) = current_tier.escalate() {
            return FuseDecision::UpgradeSeparation {
                rationale: format!(
                    "confidence {confidence:.2} below upgrade threshold {:.2}",
                    config.upgrade_threshold
                ),
                next_tier,
            };
        }
    }

    FuseDecision::RecognizerRetry {
        rationale: format!("confidence {confidence:.2} below accept threshold, no separation rung remains"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_confidence_is_accepted() {
        let decision = evaluate(0.9, false, SeparationTier::None, &GateConfig::default());
        assert!(matches!(decision, FuseDecision::Accept { .. }));
    }

    #[test]
    fn noise_tag_triggers_upgrade_before_retry() {
        let decision = evaluate(0.55, true, SeparationTier::Weak, &GateConfig::default());
        assert!(matches!(
            decision,
            FuseDecision::UpgradeSeparation { next_tier: SeparationTier::Strong, .. }
        ));
    }

    #[test]
    fn very_low_confidence_triggers_upgrade_when_rung_remains() {
        let decision = evaluate(0.1, false, SeparationTier::None, &GateConfig::default());
        assert!(matches!(
            decision,
            FuseDecision::UpgradeSeparation { next_tier: SeparationTier::Weak, .. }
        ));
    }

    #[test]
    fn low_confidence_at_top_tier_falls_through_to_recognizer_retry() {
        let decision = evaluate(0.1, false, SeparationTier::Fallback, &GateConfig::default());
        assert!(matches!(decision, FuseDecision::RecognizerRetry { .. }));
    }

    #[test]
    fn moderate_confidence_without_rung_falls_through_to_retry() {
        let decision = evaluate(0.5, false, SeparationTier::Fallback, &GateConfig::default());
        assert!(matches!(decision, FuseDecision::RecognizerRetry { .. }));
    }
}
