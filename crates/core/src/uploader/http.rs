use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::UploadServiceConfig;

use super::{UploadError, UploadPayload, UploadResult, Uploader};

/// HTTP client for the upload microservice.
pub struct HttpUploader {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUploader {
    pub fn new(config: &UploadServiceConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadResult, UploadError> {
        debug!(title = %payload.title, video_type = %payload.video_type, "Uploading video");

        let response = self
            .client
            .post(format!("{}/upload-video-v2", self.base_url))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Timeout
                } else {
                    UploadError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))
    }
}
