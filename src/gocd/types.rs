use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// State of a stage (or result of a stage/job) as GoCD reports it.
///
/// GoCD sends these as literal strings ("Building", "Passed", ...). Anything
/// the bridge does not know about collapses into `Unknown`, so downstream
/// matching stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StageState {
    Building,
    Passed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FromStr for StageState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Building" => Self::Building,
            "Passed" => Self::Passed,
            "Failed" => Self::Failed,
            "Cancelled" => Self::Cancelled,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Building => "Building",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Static pipeline configuration: the ordered stages and their jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    /// Stage names in configured order.
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    pub name: String,
}

/// A named group of pipelines, as returned by the pipeline groups endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineGroup {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// One concrete run of a pipeline.
///
/// Snapshots are read-only: the bridge never mutates what GoCD returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineInstance {
    pub name: String,
    pub counter: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub build_cause: Option<BuildCause>,
    #[serde(default)]
    pub stages: Vec<StageInstance>,
}

impl PipelineInstance {
    /// Earliest job scheduling time over all stages, in epoch milliseconds.
    pub fn first_scheduled_date(&self) -> Option<i64> {
        self.stages
            .iter()
            .filter_map(StageInstance::first_scheduled_date)
            .min()
    }

    /// A run counts as passed only when it has stages and every one passed.
    pub fn passed(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|s| s.result == StageState::Passed)
    }

    pub fn last_stage(&self) -> Option<&StageInstance> {
        self.stages.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageInstance {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub counter: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: StageState,
    #[serde(default)]
    pub jobs: Vec<JobInstance>,
}

impl StageInstance {
    pub fn first_scheduled_date(&self) -> Option<i64> {
        self.jobs.iter().filter_map(|j| j.scheduled_date).min()
    }

    /// Latest job state change in this stage, in epoch milliseconds.
    ///
    /// History summaries omit job transitions, so this is only populated on
    /// stage instances fetched in detail.
    pub fn last_job_transition_date(&self) -> Option<i64> {
        self.jobs
            .iter()
            .flat_map(|j| j.job_state_transitions.iter())
            .filter_map(|t| t.state_change_time)
            .max()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInstance {
    pub name: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub scheduled_date: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub result: StageState,
    #[serde(default)]
    pub job_state_transitions: Vec<JobStateTransition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStateTransition {
    pub state: String,
    #[serde(default)]
    pub state_change_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BuildCause {
    #[serde(default)]
    pub trigger_message: Option<String>,
    #[serde(default)]
    pub approver: Option<String>,
    #[serde(default)]
    pub material_revisions: Vec<MaterialRevision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialRevision {
    #[serde(default)]
    pub changed: bool,
    pub material: Material,
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    pub revision: String,
    #[serde(default)]
    pub modified_time: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// GoCD is inconsistent about counters: some endpoints send `"1"`, others `1`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Counter {
        Number(u64),
        Text(String),
    }

    Ok(match Counter::deserialize(deserializer)? {
        Counter::Number(n) => n.to_string(),
        Counter::Text(s) => s,
    })
}
