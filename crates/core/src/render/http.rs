use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::RenderServiceConfig;

use super::{RenderError, RenderRequest, TaskStatus, VideoRenderer};

/// HTTP client for the rendering backend.
///
/// Every response is wrapped in a `{"data": ...}` envelope.
pub struct HttpVideoRenderer {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    task_id: String,
}

impl HttpVideoRenderer {
    pub fn new(config: &RenderServiceConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url, urlencoding::encode(task_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, RenderError> {
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout
            } else {
                RenderError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RenderError> {
        let envelope: Envelope<T> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| RenderError::Parse(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl VideoRenderer for HttpVideoRenderer {
    async fn submit(&self, request: &RenderRequest) -> Result<String, RenderError> {
        debug!(subject = %request.video_subject, aspect = %request.video_aspect, "Submitting render");
        let data: SubmitData = self
            .send_json(
                self.client
                    .post(format!("{}/videos", self.base_url))
                    .json(request),
            )
            .await?;
        Ok(data.task_id)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, RenderError> {
        self.send_json(self.client.get(self.task_url(task_id))).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RenderError> {
        debug!(task_id, "Deleting render task");
        self.send(self.client.delete(self.task_url(task_id))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelopes() {
        let submit: Envelope<SubmitData> =
            serde_json::from_str(r#"{"status": 200, "data": {"task_id": "6f1c"}}"#).unwrap();
        assert_eq!(submit.data.task_id, "6f1c");

        let task: Envelope<TaskStatus> = serde_json::from_str(
            r#"{"data": {"progress": 75, "state": 4, "videos": []}}"#,
        )
        .unwrap();
        assert_eq!(task.data.progress, 75.0);
    }

    #[test]
    fn test_task_url() {
        let renderer = HttpVideoRenderer::new(&RenderServiceConfig {
            url: "http://render:8080/api/v1/".to_string(),
            ..Default::default()
        });
        assert_eq!(
            renderer.task_url("abc-123"),
            "http://render:8080/api/v1/tasks/abc-123"
        );
    }
}
