use serde::{Deserialize, Serialize};

/// Lifecycle event kinds the analytics consumer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiEventType {
    Started,
    Finished,
    Scm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildResult {
    Success,
    Failure,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CauseType {
    Upstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseType {
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiEventCause {
    #[serde(rename = "type")]
    pub cause_type: CauseType,
    pub project: String,
    pub build_ci_id: String,
}

/// An outbound lifecycle event. All times and durations are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiEvent {
    pub event_type: CiEventType,
    pub project: String,
    pub project_display_name: String,
    pub build_ci_id: String,
    pub number: String,
    pub causes: Vec<CiEventCause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BuildResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_type: Option<PhaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_data: Option<ScmData>,
}

impl CiEvent {
    /// An event with identity fields set and everything optional left empty.
    pub fn new(event_type: CiEventType, project: &str, build_ci_id: &str) -> Self {
        Self {
            event_type,
            project: project.to_string(),
            project_display_name: project.to_string(),
            build_ci_id: build_ci_id.to_string(),
            number: build_ci_id.to_string(),
            causes: Vec::new(),
            start_time: None,
            estimated_duration: None,
            duration: None,
            result: None,
            phase_type: None,
            scm_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmData {
    pub repository: ScmRepository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_rev_id: Option<String>,
    pub commits: Vec<ScmCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmRepository {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmCommit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub rev_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Identifies the CI server in every event batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiServerInfo {
    #[serde(rename = "type")]
    pub server_type: String,
    pub version: String,
    pub url: String,
    pub instance_id: String,
    pub sending_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_consumer_field_names() {
        let mut event = CiEvent::new(CiEventType::Finished, "build-app", "12");
        event.result = Some(BuildResult::Aborted);
        event.duration = Some(1_234);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "finished");
        assert_eq!(json["projectDisplayName"], "build-app");
        assert_eq!(json["buildCiId"], "12");
        assert_eq!(json["number"], "12");
        assert_eq!(json["result"], "aborted");
        assert_eq!(json["duration"], 1_234);
        assert!(json.get("startTime").is_none());
        assert!(json.get("scmData").is_none());
    }

    #[test]
    fn cause_type_is_serialized_as_type() {
        let cause = CiEventCause {
            cause_type: CauseType::Upstream,
            project: "build-app".to_string(),
            build_ci_id: "3".to_string(),
        };
        let json = serde_json::to_value(&cause).unwrap();
        assert_eq!(json["type"], "upstream");
        assert_eq!(json["buildCiId"], "3");
    }

    #[test]
    fn results_cover_only_what_gocd_can_produce() {
        let results: Vec<_> = [BuildResult::Success, BuildResult::Failure, BuildResult::Aborted]
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect();
        assert_eq!(results, vec!["success", "failure", "aborted"]);
        assert!(serde_json::from_str::<BuildResult>("\"unstable\"").is_err());
        assert_eq!(serde_json::to_value(PhaseType::Internal).unwrap(), "internal");
    }
}
