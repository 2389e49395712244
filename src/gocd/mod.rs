mod client;
mod notification;
pub mod scm;
pub mod types;

use async_trait::async_trait;

pub use client::GoCdClient;
pub use notification::StageStatusNotification;
pub use scm::{MaterialRevisionExtractor, ScmExtractor};
pub use types::{PipelineConfig, PipelineGroup, PipelineInstance, StageInstance, StageState};

use crate::error::Result;

/// Read-only queries against the upstream pipeline engine.
///
/// Implementations report "not found" as empty/`None`, never as an error.
#[async_trait]
pub trait PipelineSource: Send + Sync {
    async fn pipeline_config(&self, pipeline: &str) -> Result<Option<PipelineConfig>>;

    /// Runs of `pipeline`, most recent first.
    async fn pipeline_history(&self, pipeline: &str) -> Result<Vec<PipelineInstance>>;

    async fn pipeline_instance(
        &self,
        pipeline: &str,
        counter: u64,
    ) -> Result<Option<PipelineInstance>>;

    async fn stage_instance(
        &self,
        pipeline: &str,
        counter: u64,
        stage: &str,
        stage_counter: &str,
    ) -> Result<Option<StageInstance>>;

    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>>;

    /// Stage names in configured order, empty when the pipeline is unknown.
    async fn stage_names(&self, pipeline: &str) -> Result<Vec<String>> {
        Ok(self
            .pipeline_config(pipeline)
            .await?
            .map(|config| config.stage_names())
            .unwrap_or_default())
    }
}
