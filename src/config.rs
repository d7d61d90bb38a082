use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Default queue policy applied to newly prioritized jobs when the caller
/// does not specify one (spec.md §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum QueuePolicy {
    Gentle,
    Force,
}

impl std::str::FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gentle" => Ok(QueuePolicy::Gentle),
            "force" => Ok(QueuePolicy::Force),
            other => Err(format!("unknown queue policy: {other}")),
        }
    }
}

/// Process-wide configuration, parsed once at startup from CLI args and
/// environment variables (spec.md §6 "Environment & CLI").
#[derive(Debug, Clone, Parser)]
#[command(name = "subcontrold", about = "subtitle pipeline orchestration control plane")]
pub struct Config {
    /// Root directory for per-job state and derived artifacts (spec.md §4.9).
    #[arg(long, env = "SUBCONTROL_ROOT")]
    pub root: PathBuf,

    /// Bind host for the HTTP/SSE surface.
    #[arg(long, env = "SUBCONTROL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port for the HTTP/SSE surface.
    #[arg(long, env = "SUBCONTROL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Grace window (seconds) the shutdown supervisor waits for a client
    /// heartbeat before draining (spec.md §4.10, default 30s).
    #[arg(long, env = "SUBCONTROL_HEARTBEAT_INTERVAL_SECS", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Maximum number of concurrent media-supervisor generator workers
    /// (spec.md §4.7, default 2).
    #[arg(long, env = "SUBCONTROL_MAX_MEDIA_WORKERS", default_value_t = 2)]
    pub max_media_workers: usize,

    /// Default queue policy applied when a prioritize request omits `mode`.
    #[arg(long, env = "SUBCONTROL_DEFAULT_QUEUE_POLICY", default_value = "gentle")]
    pub default_queue_policy: QueuePolicy,

    /// Optional override for where heavy models are cached on disk.
    #[arg(long, env = "SUBCONTROL_MODEL_CACHE_DIR")]
    pub model_cache_dir: Option<PathBuf>,
}

impl Config {
    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(job_id)
    }

    pub fn queue_state_path(&self) -> PathBuf {
        self.root.join("queue_state.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_queue_policy_from_str() {
        assert_eq!("gentle".parse::<QueuePolicy>(), Ok(QueuePolicy::Gentle));
        assert_eq!("force".parse::<QueuePolicy>(), Ok(QueuePolicy::Force));
        assert!("nonsense".parse::<QueuePolicy>().is_err());
    }

    #[test]
    fn job_dir_nests_under_jobs() {
        let config = Config {
            root: PathBuf::from("/data/root"),
            host: "127.0.0.1".into(),
            port: 8080,
            heartbeat_interval_secs: 30,
            max_media_workers: 2,
            default_queue_policy: QueuePolicy::Gentle,
            model_cache_dir: None,
        };
        assert_eq!(config.job_dir("abc"), PathBuf::from("/data/root/jobs/abc"));
        assert_eq!(config.queue_state_path(), PathBuf::from("/data/root/queue_state.json"));
    }
}
