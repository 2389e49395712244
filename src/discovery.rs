//! Read-only views of GoCD pipelines in the consumer's structure format.

use log::debug;

use crate::error::{BridgeError, Result};
use crate::gocd::types::{JobInstance, PipelineConfig, StageInstance};
use crate::gocd::{PipelineInstance, PipelineSource, StageState};
use crate::octane::structure::{
    BuildStatus, CiJobsList, PipelineNode, PipelinePhase, SnapshotNode, SnapshotPhase,
};
use crate::octane::BuildResult;

/// Every pipeline across all pipeline groups.
pub async fn list_pipelines<S>(source: &S) -> Result<CiJobsList>
where
    S: PipelineSource + ?Sized,
{
    let groups = source.pipeline_groups().await?;
    let jobs = groups
        .iter()
        .flat_map(|group| group.pipelines.iter())
        .map(|pipeline| PipelineNode::leaf(&pipeline.name))
        .collect::<Vec<_>>();

    debug!("Found {} pipelines in {} groups", jobs.len(), groups.len());
    Ok(CiJobsList { jobs })
}

/// Static structure of one pipeline: its stages and, below them, their jobs.
///
/// # Errors
///
/// Returns a configuration error for an empty pipeline name.
pub async fn pipeline_structure<S>(source: &S, pipeline: &str) -> Result<Option<PipelineNode>>
where
    S: PipelineSource + ?Sized,
{
    if pipeline.is_empty() {
        return Err(BridgeError::Config("no pipeline identifier was given".to_string()));
    }

    Ok(source
        .pipeline_config(pipeline)
        .await?
        .map(|config| structure_of(&config)))
}

fn structure_of(config: &PipelineConfig) -> PipelineNode {
    let stages = config
        .stages
        .iter()
        .map(|stage| PipelineNode {
            job_ci_id: stage.name.clone(),
            name: stage.name.clone(),
            phases_internal: vec![PipelinePhase {
                name: "jobs".to_string(),
                blocking: true,
                jobs: stage.jobs.iter().map(|job| PipelineNode::leaf(&job.name)).collect(),
            }],
        })
        .collect();

    PipelineNode {
        job_ci_id: config.name.clone(),
        name: config.name.clone(),
        phases_internal: vec![PipelinePhase {
            name: "stages".to_string(),
            blocking: true,
            jobs: stages,
        }],
    }
}

/// Snapshot of the most recent run of `pipeline`, if it ever ran.
pub async fn latest_snapshot<S>(source: &S, pipeline: &str) -> Result<Option<SnapshotNode>>
where
    S: PipelineSource + ?Sized,
{
    let history = source.pipeline_history(pipeline).await?;
    Ok(history.first().map(|instance| snapshot_of(pipeline, instance)))
}

fn passed_or_failed(state: StageState) -> BuildResult {
    if state == StageState::Passed {
        BuildResult::Success
    } else {
        BuildResult::Failure
    }
}

fn snapshot_of(pipeline: &str, instance: &PipelineInstance) -> SnapshotNode {
    let all_passed = instance
        .stages
        .iter()
        .all(|stage| stage.result == StageState::Passed);

    SnapshotNode {
        job_ci_id: pipeline.to_string(),
        name: pipeline.to_string(),
        build_ci_id: instance.counter.to_string(),
        number: Some(instance.counter.to_string()),
        result: if all_passed {
            BuildResult::Success
        } else {
            BuildResult::Failure
        },
        status: BuildStatus::Finished,
        start_time: instance.first_scheduled_date(),
        phases_internal: vec![SnapshotPhase {
            name: "stages".to_string(),
            blocking: true,
            builds: instance.stages.iter().map(stage_snapshot).collect(),
        }],
    }
}

fn stage_snapshot(stage: &StageInstance) -> SnapshotNode {
    SnapshotNode {
        job_ci_id: stage.name.clone(),
        name: stage.name.clone(),
        build_ci_id: stage
            .id
            .map_or_else(|| stage.counter.clone(), |id| id.to_string()),
        number: Some(stage.counter.clone()),
        result: passed_or_failed(stage.result),
        status: BuildStatus::Finished,
        start_time: stage.first_scheduled_date(),
        phases_internal: vec![SnapshotPhase {
            name: "jobs".to_string(),
            blocking: true,
            builds: stage.jobs.iter().map(job_snapshot).collect(),
        }],
    }
}

fn job_snapshot(job: &JobInstance) -> SnapshotNode {
    SnapshotNode {
        job_ci_id: job.name.clone(),
        name: job.name.clone(),
        build_ci_id: job.id.map_or_else(|| job.name.clone(), |id| id.to_string()),
        number: None,
        result: passed_or_failed(job.result),
        status: BuildStatus::Finished,
        start_time: job.scheduled_date,
        phases_internal: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::{stage, FakeSource};
    use crate::gocd::types::{JobConfig, StageConfig};

    #[tokio::test]
    async fn lists_pipelines_from_groups() {
        let source = FakeSource::with_stages("build-app", &["compile"]);
        let list = list_pipelines(&source).await.unwrap();
        assert_eq!(list.jobs, vec![PipelineNode::leaf("build-app")]);
    }

    #[tokio::test]
    async fn structure_nests_stages_and_jobs() {
        let mut source = FakeSource::default();
        source.configs.insert(
            "build-app".to_string(),
            PipelineConfig {
                name: "build-app".to_string(),
                stages: vec![
                    StageConfig {
                        name: "compile".to_string(),
                        jobs: vec![JobConfig { name: "javac".to_string() }],
                    },
                    StageConfig {
                        name: "deploy".to_string(),
                        jobs: vec![],
                    },
                ],
            },
        );

        let node = pipeline_structure(&source, "build-app").await.unwrap().unwrap();

        assert_eq!(node.name, "build-app");
        let stages = &node.phases_internal[0];
        assert_eq!(stages.name, "stages");
        assert!(stages.blocking);
        assert_eq!(stages.jobs.len(), 2);
        assert_eq!(stages.jobs[0].phases_internal[0].jobs[0].name, "javac");
        assert!(stages.jobs[1].phases_internal[0].jobs.is_empty());
    }

    #[tokio::test]
    async fn structure_requires_a_name() {
        let source = FakeSource::default();
        let result = pipeline_structure(&source, "").await;
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[tokio::test]
    async fn structure_of_unknown_pipeline_is_none() {
        let source = FakeSource::default();
        assert!(pipeline_structure(&source, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_uses_latest_run() {
        let mut source = FakeSource::default();
        source.history.insert(
            "build-app".to_string(),
            vec![
                PipelineInstance {
                    name: "build-app".to_string(),
                    counter: 8,
                    label: "8".to_string(),
                    build_cause: None,
                    stages: vec![
                        stage("compile", StageState::Passed, Some(100), None),
                        stage("deploy", StageState::Failed, Some(200), None),
                    ],
                },
                PipelineInstance {
                    name: "build-app".to_string(),
                    counter: 7,
                    label: "7".to_string(),
                    build_cause: None,
                    stages: vec![],
                },
            ],
        );

        let snapshot = latest_snapshot(&source, "build-app").await.unwrap().unwrap();

        assert_eq!(snapshot.build_ci_id, "8");
        assert_eq!(snapshot.result, BuildResult::Failure);
        assert_eq!(snapshot.status, BuildStatus::Finished);
        assert_eq!(snapshot.start_time, Some(100));
        let stages = &snapshot.phases_internal[0].builds;
        assert_eq!(stages[0].result, BuildResult::Success);
        assert_eq!(stages[1].result, BuildResult::Failure);
        assert_eq!(stages[1].phases_internal[0].builds[0].start_time, Some(200));
    }

    #[tokio::test]
    async fn snapshot_of_never_run_pipeline_is_none() {
        let source = FakeSource::default();
        assert!(latest_snapshot(&source, "ghost").await.unwrap().is_none());
    }
}
