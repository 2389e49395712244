//! Construction of outbound lifecycle events from stage notifications.

use crate::gocd::{PipelineInstance, StageState, StageStatusNotification};
use crate::octane::{BuildResult, CauseType, CiEvent, CiEventCause, CiEventType, PhaseType, ScmData};

/// Maps a stage state onto the consumer's build result.
pub fn result_for(state: StageState) -> BuildResult {
    match state {
        StageState::Passed => BuildResult::Success,
        StageState::Cancelled => BuildResult::Aborted,
        StageState::Failed | StageState::Building | StageState::Unknown => BuildResult::Failure,
    }
}

/// STARTED event for the whole pipeline run.
pub fn pipeline_started(notification: &StageStatusNotification, estimated_duration: Option<i64>) -> CiEvent {
    let mut event = CiEvent::new(
        CiEventType::Started,
        &notification.pipeline_name,
        &notification.pipeline_counter,
    );
    event.start_time = notification
        .stage_create_time
        .map(|t| t.timestamp_millis());
    event.estimated_duration = estimated_duration;
    event
}

/// FINISHED event scoped to a single stage, caused by its pipeline run.
pub fn stage_finished(notification: &StageStatusNotification) -> CiEvent {
    let mut event = CiEvent::new(
        CiEventType::Finished,
        &notification.stage_name,
        &notification.pipeline_counter,
    );
    event.causes = vec![CiEventCause {
        cause_type: CauseType::Upstream,
        project: notification.pipeline_name.clone(),
        build_ci_id: notification.pipeline_counter.clone(),
    }];
    event.result = Some(result_for(notification.stage_state));
    event
}

/// Terminal FINISHED event for the pipeline run.
///
/// With a resolved `instance` the start time comes from the run's first
/// scheduled job rather than from the stage, and the duration runs up to the
/// notification's last transition.
pub fn pipeline_finished(
    notification: &StageStatusNotification,
    instance: Option<&PipelineInstance>,
) -> CiEvent {
    let mut event = CiEvent::new(
        CiEventType::Finished,
        &notification.pipeline_name,
        &notification.pipeline_counter,
    );
    event.result = Some(result_for(notification.stage_state));

    if let Some(instance) = instance {
        let first_scheduled = instance.first_scheduled_date();
        event.start_time = first_scheduled;
        if let (Some(start), Some(end)) = (first_scheduled, notification.stage_last_transition_time) {
            event.duration = Some(end.timestamp_millis() - start);
        }
    }

    event
}

pub fn scm_event(notification: &StageStatusNotification, scm_data: ScmData) -> CiEvent {
    let mut event = CiEvent::new(
        CiEventType::Scm,
        &notification.pipeline_name,
        &notification.pipeline_counter,
    );
    event.phase_type = Some(PhaseType::Internal);
    event.scm_data = Some(scm_data);
    event
}
