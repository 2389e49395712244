use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::types::{string_or_number, StageState};
use crate::error::Result;

/// A single stage transition reported by GoCD.
///
/// Transient: one per actual transition, possibly redelivered.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStatusNotification {
    pub pipeline_name: String,
    /// Run number, string-encoded exactly as GoCD sent it.
    pub pipeline_counter: String,
    pub stage_name: String,
    pub stage_state: StageState,
    pub stage_create_time: Option<DateTime<Utc>>,
    pub stage_last_transition_time: Option<DateTime<Utc>>,
}

impl StageStatusNotification {
    /// Parses a stage-status notification body as GoCD posts it to plugins.
    pub fn from_json(body: &str) -> Result<Self> {
        let wire: NotificationBody = serde_json::from_str(body)?;
        Ok(wire.into())
    }
}

#[derive(Deserialize)]
struct NotificationBody {
    pipeline: NotificationPipeline,
}

#[derive(Deserialize)]
struct NotificationPipeline {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    counter: String,
    stage: NotificationStage,
}

#[derive(Deserialize)]
struct NotificationStage {
    name: String,
    #[serde(default)]
    state: StageState,
    #[serde(rename = "create-time", default, deserialize_with = "optional_timestamp")]
    create_time: Option<DateTime<Utc>>,
    #[serde(
        rename = "last-transition-time",
        default,
        deserialize_with = "optional_timestamp"
    )]
    last_transition_time: Option<DateTime<Utc>>,
}

impl From<NotificationBody> for StageStatusNotification {
    fn from(body: NotificationBody) -> Self {
        let NotificationPipeline {
            name,
            counter,
            stage,
        } = body.pipeline;

        Self {
            pipeline_name: name,
            pipeline_counter: counter,
            stage_name: stage.name,
            stage_state: stage.state,
            stage_create_time: stage.create_time,
            stage_last_transition_time: stage.last_transition_time,
        }
    }
}

fn optional_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{value}'"))),
    }
}

/// Accepts RFC 3339 as well as GoCD's `2018-02-15T10:46:27.000+0000` form.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
