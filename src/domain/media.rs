use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Derived media artifact kinds a job may produce (spec.md §3 "Media Artifacts",
/// §4.7 priority order).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Source,
    AudioWav,
    Peaks,
    PreviewProxy360p,
    Thumbnails,
    Proxy720p,
}

impl ArtifactKind {
    /// Generation priority order (spec.md §4.7).
    pub const GENERATION_ORDER: [ArtifactKind; 5] = [
        ArtifactKind::AudioWav,
        ArtifactKind::Peaks,
        ArtifactKind::PreviewProxy360p,
        ArtifactKind::Thumbnails,
        ArtifactKind::Proxy720p,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactState {
    pub exists: bool,
    pub generating: bool,
    pub progress: f64,
    pub last_error: Option<String>,
}

impl ArtifactState {
    pub fn ready() -> Self {
        ArtifactState { exists: true, generating: false, progress: 100.0, last_error: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaArtifacts {
    pub states: HashMap<ArtifactKind, ArtifactState>,
}

impl MediaArtifacts {
    pub fn state(&self, kind: ArtifactKind) -> ArtifactState {
        self.states.get(&kind).cloned().unwrap_or_default()
    }

    pub fn set_state(&mut self, kind: ArtifactKind, state: ArtifactState) {
        self.states.insert(kind, state);
    }

    /// Highest-tier ready artifact, fallback order `720p -> 360p -> source`
    /// (spec.md §4.7 `best_available_url`).
    pub fn best_available(&self) -> ArtifactKind {
        for kind in [ArtifactKind::Proxy720p, ArtifactKind::PreviewProxy360p, ArtifactKind::Source] {
            if self.state(kind).exists {
                return kind;
            }
        }
        ArtifactKind::Source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_available_falls_back_to_source_when_nothing_ready() {
        let artifacts = MediaArtifacts::default();
        assert_eq!(artifacts.best_available(), ArtifactKind::Source);
    }

    #[test]
    fn best_available_prefers_720p_over_360p() {
        let mut artifacts = MediaArtifacts::default();
        artifacts.set_state(ArtifactKind::PreviewProxy360p, ArtifactState::ready());
        artifacts.set_state(ArtifactKind::Proxy720p, ArtifactState::ready());
        assert_eq!(artifacts.best_available(), ArtifactKind::Proxy720p);
    }

    #[test]
    fn best_available_uses_360p_before_720p_is_ready() {
        let mut artifacts = MediaArtifacts::default();
        artifacts.set_state(ArtifactKind::PreviewProxy360p, ArtifactState::ready());
        assert_eq!(artifacts.best_available(), ArtifactKind::PreviewProxy360p);
    }
}
