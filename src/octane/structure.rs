//! Pipeline structure and snapshot trees reported to the consumer.

use serde::{Deserialize, Serialize};

use super::types::BuildResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CiJobsList {
    pub jobs: Vec<PipelineNode>,
}

/// A node in a pipeline's static structure (pipeline, stage or job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    pub job_ci_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases_internal: Vec<PipelinePhase>,
}

impl PipelineNode {
    pub fn leaf(name: &str) -> Self {
        Self {
            job_ci_id: name.to_string(),
            name: name.to_string(),
            phases_internal: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePhase {
    pub name: String,
    pub blocking: bool,
    pub jobs: Vec<PipelineNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Finished,
}

/// A node in a run snapshot (pipeline run, stage run or job run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    pub job_ci_id: String,
    pub name: String,
    pub build_ci_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub result: BuildResult,
    pub status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases_internal: Vec<SnapshotPhase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPhase {
    pub name: String,
    pub blocking: bool,
    pub builds: Vec<SnapshotNode>,
}
