use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use url::Url;

use super::queue::TestResultsQueue;
use super::types::{CiEvent, CiServerInfo};
use super::EventSink;
use crate::auth::ClientCredentials;
use crate::config::OctaneEndpoint;
use crate::error::{BridgeError, Result};

const SERVER_TYPE: &str = "gocd";

/// Publishes lifecycle events to the Octane CI analytics API.
///
/// Signs in lazily on the first publish; the session cookie is then reused by
/// the underlying HTTP client. A publish rejected as unauthorised signs in
/// again and is retried once.
pub struct OctaneClient {
    client: Client,
    base_url: Url,
    shared_space: String,
    credentials: ClientCredentials,
    server_url: String,
    instance_id: String,
    /// Whether the cookie store holds a session believed to be valid.
    signed_in: Mutex<bool>,
    queue: Arc<TestResultsQueue>,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Serialize)]
struct EventsList<'a> {
    server: CiServerInfo,
    events: &'a [CiEvent],
}

impl OctaneClient {
    /// # Arguments
    ///
    /// * `endpoint` - Octane base URL and shared space
    /// * `credentials` - API access key pair
    /// * `server_url` - URL of the GoCD server, reported in every batch
    /// * `instance_id` - Stable identifier of this GoCD instance
    pub fn new(
        endpoint: &OctaneEndpoint,
        credentials: ClientCredentials,
        server_url: &str,
        instance_id: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gocd-octane-bridge/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(&endpoint.base_url)
            .map_err(|e| BridgeError::Config(format!("Invalid Octane URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            shared_space: endpoint.shared_space.clone(),
            credentials,
            server_url: server_url.to_string(),
            instance_id: instance_id.to_string(),
            signed_in: Mutex::new(false),
            queue: Arc::new(TestResultsQueue::new()),
        })
    }

    /// Queue of test-result pulls requested so far.
    pub fn test_results_queue(&self) -> Arc<TestResultsQueue> {
        Arc::clone(&self.queue)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BridgeError::Config(format!("Octane URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn server_info(&self) -> CiServerInfo {
        CiServerInfo {
            server_type: SERVER_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: self.server_url.clone(),
            instance_id: self.instance_id.clone(),
            sending_time: Utc::now().timestamp_millis(),
        }
    }

    async fn sign_in(&self) -> Result<()> {
        let url = self.endpoint(&["authentication", "sign_in"])?;
        debug!("Signing in to Octane at {url}");

        let response = self
            .client
            .post(url)
            .json(&SignInRequest {
                client_id: &self.credentials.client_id,
                client_secret: self.credentials.client_secret.as_str(),
            })
            .send()
            .await?;

        ensure_success(response).await?;
        info!("Signed in to Octane shared space {}", self.shared_space);
        Ok(())
    }

    async fn ensure_session(&self) -> Result<()> {
        let mut signed_in = self.signed_in.lock().await;
        if !*signed_in {
            self.sign_in().await?;
            *signed_in = true;
        }
        Ok(())
    }

    async fn invalidate_session(&self) {
        *self.signed_in.lock().await = false;
    }

    /// Sends a batch of events in a single request.
    pub async fn publish_events(&self, events: &[CiEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        self.ensure_session().await?;

        let response = self.put_events(events).await?;
        if !is_unauthorised(response.status()) {
            return ensure_success(response).await;
        }

        warn!(
            "Octane rejected the session ({}); signing in again",
            response.status()
        );
        self.invalidate_session().await;
        self.ensure_session().await?;

        let response = self.put_events(events).await?;
        ensure_success(response).await
    }

    async fn put_events(&self, events: &[CiEvent]) -> Result<Response> {
        let url = self.endpoint(&[
            "internal-api",
            "shared_spaces",
            &self.shared_space,
            "analytics",
            "ci",
            "events",
        ])?;

        let response = self
            .client
            .put(url)
            .json(&EventsList {
                server: self.server_info(),
                events,
            })
            .send()
            .await?;
        Ok(response)
    }
}

fn is_unauthorised(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

async fn ensure_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(BridgeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EventSink for OctaneClient {
    async fn publish_event(&self, event: CiEvent) -> Result<()> {
        debug!(
            "Publishing {:?} event for {} #{}",
            event.event_type, event.project, event.build_ci_id
        );
        self.publish_events(std::slice::from_ref(&event)).await
    }

    async fn enqueue_test_results_pull(&self, pipeline: &str, counter: &str) -> Result<()> {
        if self.queue.enqueue(pipeline, counter) {
            info!("Queued test results pull for {pipeline} #{counter}");
        }
        Ok(())
    }
}
