use serde::{Deserialize, Serialize};

use crate::domain::{EngineSettings, Job, MediaArtifacts, OnBreakPolicy, SeparationPolicy};

fn default_model_id() -> String {
    "primary".to_string()
}

fn default_compute_precision() -> String {
    "fp16".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_batch_size() -> u32 {
    1
}

fn default_separation_policy() -> SeparationPolicy {
    SeparationPolicy::Auto
}

fn default_problem_segment_suffix() -> String {
    crate::domain::default_problem_segment_suffix()
}

/// Wire shape of `EngineSettings`, with the same defaults a fresh job gets
/// when the caller only cares about overriding a few fields (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_compute_precision")]
    pub compute_precision: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default)]
    pub word_level_timestamps: bool,
    #[serde(default = "default_separation_policy")]
    pub separation_policy: SeparationPolicy,
    #[serde(default)]
    pub on_break_policy: OnBreakPolicy,
    #[serde(default = "default_problem_segment_suffix")]
    pub problem_segment_suffix: String,
}

impl From<SettingsRequest> for EngineSettings {
    fn from(req: SettingsRequest) -> Self {
        EngineSettings {
            model_id: req.model_id,
            compute_precision: req.compute_precision,
            device: req.device,
            batch_size: req.batch_size,
            word_level_timestamps: req.word_level_timestamps,
            separation_policy: req.separation_policy,
            on_break_policy: req.on_break_policy,
            problem_segment_suffix: req.problem_segment_suffix,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: String,
    pub filename: String,
    pub queue_position: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub input_path: String,
    #[serde(default)]
    pub settings: Option<SettingsRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub job_id: String,
    #[serde(default)]
    pub settings: Option<SettingsRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub started: bool,
    pub queue_position: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    #[serde(default)]
    pub delete_data: bool,
}

#[derive(Debug, Deserialize)]
pub struct PrioritizeQuery {
    pub mode: Option<crate::config::QueuePolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

/// Full job snapshot plus media status, the `GET /api/status/{id}` shape
/// (spec.md §6).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    #[serde(flatten)]
    pub job: Job,
    pub media: MediaArtifacts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResumeResponse {
    pub resumable: bool,
    pub total_segments: Option<u32>,
    pub processed_segments: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PeaksQuery {
    pub samples: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailsQuery {
    pub count: Option<u32>,
    #[serde(default)]
    pub sprite: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressiveStatusResponse {
    pub best: String,
    pub artifacts: MediaArtifacts,
}

#[derive(Debug, Deserialize)]
pub struct SaveSrtRequest {
    pub srt: String,
}

#[derive(Debug, Deserialize)]
pub struct ClientIdQuery {
    pub client_id: String,
}
