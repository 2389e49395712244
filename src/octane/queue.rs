use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};

/// A request for the consumer to pull test results of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultsRequest {
    pub pipeline: String,
    pub counter: String,
}

/// FIFO of pending test-result pulls, shared between notification handlers.
///
/// A request that is already waiting is not queued twice, which absorbs
/// redelivered terminal notifications.
#[derive(Debug, Default)]
pub struct TestResultsQueue {
    pending: Mutex<VecDeque<TestResultsRequest>>,
}

impl TestResultsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an identical request is still pending.
    pub fn enqueue(&self, pipeline: &str, counter: &str) -> bool {
        let request = TestResultsRequest {
            pipeline: pipeline.to_string(),
            counter: counter.to_string(),
        };

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.contains(&request) {
            debug!("Test results pull for {pipeline} #{counter} already queued");
            return false;
        }
        pending.push_back(request);
        true
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every pending request, oldest first.
    pub fn drain(&self) -> Vec<TestResultsRequest> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}
