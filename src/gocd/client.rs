use async_trait::async_trait;
use log::debug;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::types::{PipelineConfig, PipelineGroup, PipelineInstance, StageInstance};
use super::PipelineSource;
use crate::auth::BasicCredentials;
use crate::error::{BridgeError, Result};

const PIPELINE_CONFIG_ACCEPT: &str = "application/vnd.go.cd.v11+json";
const PIPELINE_HISTORY_ACCEPT: &str = "application/vnd.go.cd.v1+json";
const PIPELINE_INSTANCE_ACCEPT: &str = "application/vnd.go.cd.v1+json";
const STAGE_INSTANCE_ACCEPT: &str = "application/vnd.go.cd.v3+json";
const PIPELINE_GROUPS_ACCEPT: &str = "application/json";

/// Thin client over the GoCD REST API.
///
/// Every call is a fresh point-in-time query; nothing is cached.
pub struct GoCdClient {
    client: Client,
    api_url: Url,
    credentials: Option<BasicCredentials>,
}

impl GoCdClient {
    pub fn new(base_url: &str, credentials: Option<BasicCredentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gocd-octane-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| BridgeError::Config(format!("Invalid GoCD URL: {e}")))?
            .join("go/api/")
            .map_err(|e| BridgeError::Config(format!("Invalid GoCD API URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            credentials,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(credentials) = &self.credentials {
            request.basic_auth(
                &credentials.username,
                Some(credentials.password.as_str()),
            )
        } else {
            request
        }
    }

    /// Builds an API URL from path segments; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| BridgeError::Config(format!("GoCD URL cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON resource. A 404 is reported as `None`.
    async fn get_json<T>(&self, url: Url, accept: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self
            .auth_request(self.client.get(url).header(ACCEPT, accept))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(BridgeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response.json().await?))
    }
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    pipelines: Vec<PipelineInstance>,
}

#[async_trait]
impl PipelineSource for GoCdClient {
    async fn pipeline_config(&self, pipeline: &str) -> Result<Option<PipelineConfig>> {
        let url = self.endpoint(&["admin", "pipelines", pipeline])?;
        self.get_json(url, PIPELINE_CONFIG_ACCEPT).await
    }

    async fn pipeline_history(&self, pipeline: &str) -> Result<Vec<PipelineInstance>> {
        let url = self.endpoint(&["pipelines", pipeline, "history"])?;
        let history: Option<HistoryResponse> = self.get_json(url, PIPELINE_HISTORY_ACCEPT).await?;
        Ok(history.map(|h| h.pipelines).unwrap_or_default())
    }

    async fn pipeline_instance(
        &self,
        pipeline: &str,
        counter: u64,
    ) -> Result<Option<PipelineInstance>> {
        let counter = counter.to_string();
        let url = self.endpoint(&["pipelines", pipeline, &counter])?;
        self.get_json(url, PIPELINE_INSTANCE_ACCEPT).await
    }

    async fn stage_instance(
        &self,
        pipeline: &str,
        counter: u64,
        stage: &str,
        stage_counter: &str,
    ) -> Result<Option<StageInstance>> {
        let counter = counter.to_string();
        let url = self.endpoint(&["stages", pipeline, &counter, stage, stage_counter])?;
        self.get_json(url, STAGE_INSTANCE_ACCEPT).await
    }

    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>> {
        let url = self.endpoint(&["config", "pipeline_groups"])?;
        let groups: Option<Vec<PipelineGroup>> = self.get_json(url, PIPELINE_GROUPS_ACCEPT).await?;
        Ok(groups.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gocd::types::StageState;

    fn client_for(server: &mockito::ServerGuard) -> GoCdClient {
        GoCdClient::new(
            &server.url(),
            Some(BasicCredentials::new("admin", "secret")),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = GoCdClient::new("not a url", None);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let client = GoCdClient::new("https://ci.example.com/", None).unwrap();
        let url = client.endpoint(&["pipelines", "my pipeline", "history"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/go/api/pipelines/my%20pipeline/history"
        );
    }

    #[tokio::test]
    async fn fetches_stage_names_in_configured_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/go/api/admin/pipelines/build-app")
            .match_header("accept", PIPELINE_CONFIG_ACCEPT)
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"build-app","stages":[
                    {"name":"compile","jobs":[{"name":"javac"}]},
                    {"name":"test","jobs":[]},
                    {"name":"deploy"}]}"#,
            )
            .create_async()
            .await;

        let names = client_for(&server).stage_names("build-app").await.unwrap();

        mock.assert_async().await;
        assert_eq!(names, vec!["compile", "test", "deploy"]);
    }

    #[tokio::test]
    async fn missing_pipeline_config_yields_no_stages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/admin/pipelines/ghost")
            .with_status(404)
            .create_async()
            .await;

        let names = client_for(&server).stage_names("ghost").await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn parses_pipeline_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/pipelines/build-app/history")
            .match_header("accept", PIPELINE_HISTORY_ACCEPT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"_links":{},"pipelines":[
                    {"name":"build-app","counter":2,"label":"2","stages":[
                        {"name":"compile","counter":"1","result":"Passed",
                         "jobs":[{"name":"javac","scheduled_date":1000,"result":"Passed"}]}]},
                    {"name":"build-app","counter":1,"label":"1","stages":[
                        {"name":"compile","counter":"1","result":"Failed","jobs":[]}]}]}"#,
            )
            .create_async()
            .await;

        let history = client_for(&server).pipeline_history("build-app").await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].counter, 2);
        assert!(history[0].passed());
        assert_eq!(history[0].first_scheduled_date(), Some(1000));
        assert_eq!(history[1].stages[0].result, StageState::Failed);
    }

    #[tokio::test]
    async fn fetches_stage_instance_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/stages/build-app/7/deploy/2")
            .match_header("accept", STAGE_INSTANCE_ACCEPT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"deploy","counter":2,"result":"Passed","jobs":[
                    {"name":"ship","scheduled_date":100,"job_state_transitions":[
                        {"state":"Scheduled","state_change_time":100},
                        {"state":"Completed","state_change_time":900}]}]}"#,
            )
            .create_async()
            .await;

        let stage = client_for(&server)
            .stage_instance("build-app", 7, "deploy", "2")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stage.counter, "2");
        assert_eq!(stage.last_job_transition_date(), Some(900));
    }

    #[tokio::test]
    async fn missing_instance_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/pipelines/build-app/99")
            .with_status(404)
            .create_async()
            .await;

        let instance = client_for(&server).pipeline_instance("build-app", 99).await.unwrap();
        assert!(instance.is_none());
    }

    #[tokio::test]
    async fn server_errors_surface_as_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/go/api/config/pipeline_groups")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = client_for(&server).pipeline_groups().await.unwrap_err();
        match err {
            BridgeError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
