use serde::{Deserialize, Serialize};

/// One bounded log line attached to a job's run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobLogLine {
    pub text: String,
    pub at_ms: Option<u64>,
}
