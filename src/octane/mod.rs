mod client;
mod queue;
pub mod structure;
pub mod types;

use async_trait::async_trait;

pub use client::OctaneClient;
pub use queue::{TestResultsQueue, TestResultsRequest};
pub use types::{BuildResult, CauseType, CiEvent, CiEventCause, CiEventType, PhaseType, ScmData};

use crate::error::Result;

/// Downstream side of the bridge: where lifecycle events end up.
///
/// Implementations must tolerate concurrent calls for different pipelines.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_event(&self, event: CiEvent) -> Result<()>;

    /// Asks the consumer to fetch and ingest the run's test results later.
    async fn enqueue_test_results_pull(&self, pipeline: &str, counter: &str) -> Result<()>;
}
