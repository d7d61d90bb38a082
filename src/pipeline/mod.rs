//! C5: Pipeline Runner — drives one job through the fixed stage machine
//! `extract -> split -> bgm_detect -> separate -> transcribe -> align ->
//! render -> complete` (spec.md §4.5).

mod cancel;
mod collaborators;
mod runner;
mod weights;

pub use cancel::{CancelToken, PauseGate};
pub use collaborators::{run_external_tool, Aligner, Recognizer, Separator, Transcoder};
pub use runner::{PipelineContext, PipelineRunner};
pub use weights::{StageWeights, WeightInputs};
