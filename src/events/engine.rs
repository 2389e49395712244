use std::sync::Arc;

use log::{debug, info, warn};

use super::builder;
use super::estimator::{estimate_duration, DEFAULT_SAMPLES};
use super::position::StagePosition;
use crate::error::{BridgeError, Result};
use crate::gocd::{
    MaterialRevisionExtractor, PipelineInstance, PipelineSource, ScmExtractor, StageState,
    StageStatusNotification,
};
use crate::octane::{BuildResult, EventSink};

/// What a single stage notification means at pipeline level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    PipelineStart,
    /// A non-final stage passed. Built internally, never published.
    StageEnd,
    PipelineEnd(BuildResult),
    Ignore,
}

/// The transition table. A failed or cancelled stage ends the pipeline
/// wherever it sits, since nothing runs past it.
pub fn classify(state: StageState, position: StagePosition) -> Transition {
    match state {
        StageState::Building if position.is_first => Transition::PipelineStart,
        StageState::Building => Transition::Ignore,
        StageState::Passed if position.is_last => Transition::PipelineEnd(BuildResult::Success),
        StageState::Passed => Transition::StageEnd,
        StageState::Failed => Transition::PipelineEnd(BuildResult::Failure),
        StageState::Cancelled => Transition::PipelineEnd(BuildResult::Aborted),
        StageState::Unknown => Transition::PipelineEnd(BuildResult::Failure),
    }
}

/// Turns stage-level notifications into pipeline-level lifecycle events.
///
/// Holds no state between notifications: every decision is re-derived from
/// fresh upstream queries, so a restart loses nothing. Redelivered
/// notifications may produce duplicate events; the consumer is expected to
/// be idempotent on build id and event type.
pub struct EventCorrelationEngine {
    source: Arc<dyn PipelineSource>,
    sink: Arc<dyn EventSink>,
    scm: Arc<dyn ScmExtractor>,
    estimate_samples: usize,
}

impl EventCorrelationEngine {
    pub fn new(source: Arc<dyn PipelineSource>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            scm: Arc::new(MaterialRevisionExtractor),
            estimate_samples: DEFAULT_SAMPLES,
        }
    }

    #[must_use]
    pub fn with_scm_extractor(mut self, scm: Arc<dyn ScmExtractor>) -> Self {
        self.scm = scm;
        self
    }

    #[must_use]
    pub fn with_estimate_samples(mut self, samples: usize) -> Self {
        self.estimate_samples = samples;
        self
    }

    /// Handles one stage-status notification.
    ///
    /// An absent notification is a no-op. Errors are limited to upstream or
    /// downstream failures and malformed identifiers; they never leave state
    /// behind that could affect later notifications.
    pub async fn on_stage_status(
        &self,
        notification: Option<&StageStatusNotification>,
    ) -> Result<Transition> {
        let Some(notification) = notification else {
            debug!("Ignoring empty stage notification");
            return Ok(Transition::Ignore);
        };

        let stages = self.source.stage_names(&notification.pipeline_name).await?;
        let position = StagePosition::classify(&notification.stage_name, &stages);
        let transition = classify(notification.stage_state, position);

        debug!(
            "{} #{} stage '{}' is {} -> {transition:?}",
            notification.pipeline_name,
            notification.pipeline_counter,
            notification.stage_name,
            notification.stage_state
        );

        match transition {
            Transition::PipelineStart => self.send_pipeline_start(notification).await?,
            Transition::StageEnd => {
                let event = builder::stage_finished(notification);
                debug!("Stage end for '{}' not forwarded: {event:?}", event.project);
            }
            Transition::PipelineEnd(_) => self.send_pipeline_end(notification).await?,
            Transition::Ignore => {}
        }

        Ok(transition)
    }

    async fn send_pipeline_start(&self, notification: &StageStatusNotification) -> Result<()> {
        let pipeline = &notification.pipeline_name;

        // The estimate is advisory; a failed lookup must not hold back the start event.
        let estimated = match estimate_duration(self.source.as_ref(), pipeline, self.estimate_samples).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!("Could not estimate duration of {pipeline}: {e}");
                None
            }
        };

        info!(
            "Pipeline {pipeline} #{} started (estimate: {estimated:?} ms)",
            notification.pipeline_counter
        );
        self.sink
            .publish_event(builder::pipeline_started(notification, estimated))
            .await
    }

    async fn send_pipeline_end(&self, notification: &StageStatusNotification) -> Result<()> {
        let pipeline = &notification.pipeline_name;
        let counter = parse_counter(notification)?;

        let instance = self.source.pipeline_instance(pipeline, counter).await?;
        if instance.is_none() {
            warn!("No instance found for {pipeline} #{counter}; publishing without timing data");
        }

        let event = builder::pipeline_finished(notification, instance.as_ref());
        info!(
            "Pipeline {pipeline} #{counter} finished with {:?}",
            event.result
        );
        self.sink.publish_event(event).await?;

        if let Some(instance) = instance {
            self.send_scm_event(notification, &instance).await;
            self.sink
                .enqueue_test_results_pull(pipeline, &notification.pipeline_counter)
                .await?;
        }

        Ok(())
    }

    /// Publishes the run's commits, if any. A failure here is logged and
    /// does not hold back the test-results pull.
    async fn send_scm_event(&self, notification: &StageStatusNotification, instance: &PipelineInstance) {
        let data = match self.scm.extract(instance) {
            Some(data) if !data.commits.is_empty() => data,
            _ => {
                debug!(
                    "No changed commits for {} #{}",
                    notification.pipeline_name, notification.pipeline_counter
                );
                return;
            }
        };

        debug!(
            "Publishing {} commits for {} #{}",
            data.commits.len(),
            notification.pipeline_name,
            notification.pipeline_counter
        );
        if let Err(e) = self
            .sink
            .publish_event(builder::scm_event(notification, data))
            .await
        {
            warn!(
                "Could not publish SCM changes for {} #{}: {e}",
                notification.pipeline_name, notification.pipeline_counter
            );
        }
    }
}

fn parse_counter(notification: &StageStatusNotification) -> Result<u64> {
    notification.pipeline_counter.trim().parse().map_err(|e| {
        BridgeError::Config(format!(
            "Invalid counter '{}' for pipeline {}: {e}",
            notification.pipeline_counter, notification.pipeline_name
        ))
    })
}
