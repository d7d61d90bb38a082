use std::path::Path;

use crate::domain::ArtifactKind;
use crate::error::AppError;
use crate::persistence::JobPaths;

/// Produces one derived media artifact (spec.md §4.7). The actual codec/
/// waveform/thumbnail tooling is out of scope (spec.md §1); a real
/// implementation shells out the same way the transcoding engine this was
/// modeled on invokes ffmpeg.
pub trait ArtifactGenerator: Send + Sync {
    fn generate(&self, kind: ArtifactKind, input_media_path: &Path, paths: &JobPaths) -> Result<(), AppError>;
}
