//! Upload worker: publishes due uploads.
//!
//! Channels are processed concurrently, uploads within one channel one
//! after another with a pause in between. A failed upload stays `Unlisted`
//! and is picked up again on the next sweep.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::metrics;
use crate::reporting::ErrorReporter;
use crate::store::{StoreError, Upload, WorkStore};
use crate::uploader::{UploadPayload, Uploader};

use super::config::{LoopPolicy, PublishingConfig};
use super::types::{Pass, PipelineError, Stage};

pub struct UploadPublisher {
    store: Arc<dyn WorkStore>,
    uploader: Arc<dyn Uploader>,
    reporter: Arc<dyn ErrorReporter>,
    config: PublishingConfig,
    video_task_dir: PathBuf,
}

impl UploadPublisher {
    pub fn new(
        store: Arc<dyn WorkStore>,
        uploader: Arc<dyn Uploader>,
        reporter: Arc<dyn ErrorReporter>,
        config: PublishingConfig,
        video_task_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            uploader,
            reporter,
            config,
            video_task_dir,
        }
    }

    /// Upload one due record and flip it to public.
    pub async fn publish(&self, upload: &Upload) -> Result<String, PipelineError> {
        let keyword = self
            .store
            .get_keyword(&upload.keyword_id)?
            .ok_or_else(|| StoreError::NotFound(format!("keyword {}", upload.keyword_id)))?;
        let channel = self
            .store
            .get_channel(&upload.channel_id)?
            .ok_or_else(|| StoreError::NotFound(format!("channel {}", upload.channel_id)))?;

        let payload = UploadPayload::build(upload, &keyword, &channel, &self.video_task_dir)?;
        let result = self.uploader.upload(&payload).await?;

        if !self.store.publish_upload(&upload.id, &result.youtube_link)? {
            warn!(upload_id = %upload.id, "Upload was already published");
        }
        info!(
            channel = %channel.name,
            keyword = %keyword.keyword,
            format = %upload.video_type,
            link = %result.youtube_link,
            "Published upload"
        );
        Ok(result.youtube_link)
    }

    async fn publish_channel(&self, uploads: Vec<Upload>) -> usize {
        let mut published = 0;
        let total = uploads.len();

        for (i, upload) in uploads.iter().enumerate() {
            match self.publish(upload).await {
                Ok(_) => {
                    published += 1;
                    metrics::UPLOADS.with_label_values(&["published"]).inc();
                }
                Err(e) => {
                    metrics::UPLOADS.with_label_values(&["failed"]).inc();
                    warn!(upload_id = %upload.id, error = %e, "Upload failed");
                    self.reporter.capture("upload", &e);
                }
            }
            if i + 1 < total {
                tokio::time::sleep(self.config.upload_spacing()).await;
            }
        }

        published
    }

    /// Publish every upload due at `now`. Returns how many went public.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let due = self.store.list_due_uploads(now)?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut by_channel: BTreeMap<String, Vec<Upload>> = BTreeMap::new();
        for upload in due {
            by_channel
                .entry(upload.channel_id.clone())
                .or_default()
                .push(upload);
        }

        let published = join_all(
            by_channel
                .into_values()
                .map(|uploads| self.publish_channel(uploads)),
        )
        .await
        .into_iter()
        .sum();

        Ok(published)
    }
}

#[async_trait]
impl Stage for UploadPublisher {
    fn name(&self) -> &'static str {
        "publishing"
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let published = self.publish_due(Utc::now()).await?;
        Ok(if published > 0 { Pass::Worked } else { Pass::Idle })
    }
}
