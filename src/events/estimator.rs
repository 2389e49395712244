use log::debug;

use crate::error::Result;
use crate::gocd::PipelineSource;

/// Number of recent successful runs considered by default.
pub const DEFAULT_SAMPLES: usize = 3;

/// Weight of each newer sample in the moving average.
const SMOOTHING: f64 = 0.5;

/// Estimates how long the next run of `pipeline` will take, in milliseconds.
///
/// Looks at up to `max_samples` of the most recent successful runs and
/// combines their durations with an exponential moving average in which the
/// newest run weighs most. Returns `None` when no run yields a duration.
pub async fn estimate_duration<S>(
    source: &S,
    pipeline: &str,
    max_samples: usize,
) -> Result<Option<i64>>
where
    S: PipelineSource + ?Sized,
{
    let durations = last_successful_durations(source, pipeline, max_samples).await?;
    debug!(
        "Collected {} successful durations for {pipeline}: {durations:?}",
        durations.len()
    );
    Ok(smooth(&durations))
}

/// Durations of the last successful runs, newest first.
///
/// History summaries lack job transitions, so each run's last stage is
/// fetched in detail. Runs that yield no duration are skipped and do not
/// count toward `max_samples`.
pub async fn last_successful_durations<S>(
    source: &S,
    pipeline: &str,
    max_samples: usize,
) -> Result<Vec<i64>>
where
    S: PipelineSource + ?Sized,
{
    let mut durations = Vec::with_capacity(max_samples);

    for instance in source.pipeline_history(pipeline).await? {
        if durations.len() >= max_samples {
            break;
        }
        if !instance.passed() {
            continue;
        }
        let Some(start) = instance.first_scheduled_date() else {
            continue;
        };
        let Some(last_stage) = instance.last_stage() else {
            continue;
        };

        let detail = source
            .stage_instance(pipeline, instance.counter, &last_stage.name, &last_stage.counter)
            .await?;

        if let Some(end) = detail.and_then(|stage| stage.last_job_transition_date()) {
            durations.push(end - start);
        }
    }

    Ok(durations)
}

/// Folds newest-first durations oldest-to-newest into a moving average.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn smooth(newest_first: &[i64]) -> Option<i64> {
    newest_first.iter().rev().fold(None, |estimate, &duration| {
        Some(match estimate {
            None => duration,
            Some(previous) => {
                (previous as f64 * (1.0 - SMOOTHING) + duration as f64 * SMOOTHING) as i64
            }
        })
    })
}
