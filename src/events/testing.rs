//! In-memory upstream and downstream doubles shared by the engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{BridgeError, Result};
use crate::gocd::types::{
    JobInstance, JobStateTransition, PipelineConfig, PipelineGroup, PipelineInstance, StageConfig,
    StageInstance, StageState,
};
use crate::gocd::{PipelineSource, StageStatusNotification};
use crate::octane::{CiEvent, CiEventType, EventSink};

#[derive(Default)]
pub struct FakeSource {
    pub configs: HashMap<String, PipelineConfig>,
    pub history: HashMap<String, Vec<PipelineInstance>>,
    pub instances: HashMap<(String, u64), PipelineInstance>,
    pub stage_details: HashMap<(String, u64, String), StageInstance>,
    pub fail_history: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_stages(pipeline: &str, stages: &[&str]) -> Self {
        let mut source = Self::default();
        source.configs.insert(
            pipeline.to_string(),
            PipelineConfig {
                name: pipeline.to_string(),
                stages: stages
                    .iter()
                    .map(|s| StageConfig {
                        name: (*s).to_string(),
                        jobs: vec![],
                    })
                    .collect(),
            },
        );
        source
    }

    /// Adds a run to the history (call newest first) together with the detail
    /// record of its last stage, so its duration is `end - start`.
    pub fn add_run(&mut self, pipeline: &str, counter: u64, passed: bool, start: i64, end: i64) {
        let result = if passed {
            StageState::Passed
        } else {
            StageState::Failed
        };
        let summary = stage("deploy", result, Some(start), None);
        let instance = PipelineInstance {
            name: pipeline.to_string(),
            counter,
            label: counter.to_string(),
            build_cause: None,
            stages: vec![summary],
        };
        self.history
            .entry(pipeline.to_string())
            .or_default()
            .push(instance.clone());
        self.instances
            .insert((pipeline.to_string(), counter), instance);
        self.stage_details.insert(
            (pipeline.to_string(), counter, "deploy".to_string()),
            stage("deploy", result, Some(start), Some(end)),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn stage(
    name: &str,
    result: StageState,
    scheduled: Option<i64>,
    completed: Option<i64>,
) -> StageInstance {
    StageInstance {
        name: name.to_string(),
        counter: "1".to_string(),
        id: None,
        result,
        jobs: vec![JobInstance {
            name: "job".to_string(),
            id: None,
            scheduled_date: scheduled,
            state: Some("Completed".to_string()),
            result,
            job_state_transitions: completed
                .into_iter()
                .map(|t| JobStateTransition {
                    state: "Completed".to_string(),
                    state_change_time: Some(t),
                })
                .collect(),
        }],
    }
}

#[async_trait]
impl PipelineSource for FakeSource {
    async fn pipeline_config(&self, pipeline: &str) -> Result<Option<PipelineConfig>> {
        self.record(format!("config {pipeline}"));
        Ok(self.configs.get(pipeline).cloned())
    }

    async fn pipeline_history(&self, pipeline: &str) -> Result<Vec<PipelineInstance>> {
        self.record(format!("history {pipeline}"));
        if self.fail_history {
            return Err(BridgeError::Api {
                status: 500,
                message: "history unavailable".to_string(),
            });
        }
        Ok(self.history.get(pipeline).cloned().unwrap_or_default())
    }

    async fn pipeline_instance(
        &self,
        pipeline: &str,
        counter: u64,
    ) -> Result<Option<PipelineInstance>> {
        self.record(format!("instance {pipeline}/{counter}"));
        Ok(self.instances.get(&(pipeline.to_string(), counter)).cloned())
    }

    async fn stage_instance(
        &self,
        pipeline: &str,
        counter: u64,
        stage: &str,
        _stage_counter: &str,
    ) -> Result<Option<StageInstance>> {
        self.record(format!("stage {pipeline}/{counter}/{stage}"));
        Ok(self
            .stage_details
            .get(&(pipeline.to_string(), counter, stage.to_string()))
            .cloned())
    }

    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>> {
        Ok(vec![PipelineGroup {
            name: "default".to_string(),
            pipelines: self.configs.values().cloned().collect(),
        }])
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<CiEvent>>,
    pub pulls: Mutex<Vec<(String, String)>>,
    /// Answer SCM events with an API error instead of recording them.
    pub reject_scm: bool,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn pulls(&self) -> Vec<(String, String)> {
        self.pulls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish_event(&self, event: CiEvent) -> Result<()> {
        if self.reject_scm && event.event_type == CiEventType::Scm {
            return Err(BridgeError::Api {
                status: 400,
                message: "scm events rejected".to_string(),
            });
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn enqueue_test_results_pull(&self, pipeline: &str, counter: &str) -> Result<()> {
        self.pulls
            .lock()
            .unwrap()
            .push((pipeline.to_string(), counter.to_string()));
        Ok(())
    }
}

pub fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

pub fn notification(pipeline: &str, counter: &str, stage: &str, state: StageState) -> StageStatusNotification {
    StageStatusNotification {
        pipeline_name: pipeline.to_string(),
        pipeline_counter: counter.to_string(),
        stage_name: stage.to_string(),
        stage_state: state,
        stage_create_time: None,
        stage_last_transition_time: None,
    }
}
