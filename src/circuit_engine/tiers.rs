use crate::domain::{MusicalityLevel, SeparationPolicy, SeparationTier};
use crate::models::HardwareProfile;

/// Separation tier resolution (spec.md §4.4 step 2). `off` always skips;
/// on hardware without a GPU, separation is skipped unless the user policy
/// is `always`.
pub fn resolve_initial_tier(
    policy: SeparationPolicy,
    bgm: MusicalityLevel,
    hardware: HardwareProfile,
) -> SeparationTier {
    match policy {
        SeparationPolicy::Off => SeparationTier::None,
        SeparationPolicy::Always => SeparationTier::Weak,
        SeparationPolicy::Auto => {
            if matches!(hardware, HardwareProfile::NoGpu) {
                return SeparationTier::None;
            }
            match bgm {
                MusicalityLevel::None => SeparationTier::None,
                MusicalityLevel::Light => SeparationTier::Weak,
                MusicalityLevel::Heavy => SeparationTier::Strong,
            }
        }
    }
}
