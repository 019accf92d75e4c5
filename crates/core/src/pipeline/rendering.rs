//! Video generation stage, one instance per format.
//!
//! Each sweep visits the active channels in order. A channel whose buffer of
//! rendered but not yet uploaded videos already exceeds its daily limit is
//! skipped. Otherwise one keyword is claimed, rendered and marked done.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::render::{wait_for_completion, RenderError, RenderRequest, VideoRenderer, WatchSettings};
use crate::reporting::ErrorReporter;
use crate::store::{Channel, ChannelFilter, Keyword, StoreError, VideoFormat, VideoRef, WorkStore};

use super::config::{LoopPolicy, RenderingConfig};
use super::types::{Pass, PipelineError, Stage};

pub struct RenderStage {
    format: VideoFormat,
    store: Arc<dyn WorkStore>,
    renderer: Arc<dyn VideoRenderer>,
    reporter: Arc<dyn ErrorReporter>,
    config: RenderingConfig,
}

impl RenderStage {
    pub fn new(
        format: VideoFormat,
        store: Arc<dyn WorkStore>,
        renderer: Arc<dyn VideoRenderer>,
        reporter: Arc<dyn ErrorReporter>,
        config: RenderingConfig,
    ) -> Self {
        Self {
            format,
            store,
            renderer,
            reporter,
            config,
        }
    }

    fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            poll_interval: self.config.poll_interval(),
            poll_retry: self.config.poll_retry(),
            stuck_timeout: self.config.stuck_timeout(),
        }
    }

    /// Rendered videos not yet assigned to an upload on this channel.
    pub fn availability(&self, channel: &Channel) -> Result<i64, PipelineError> {
        let rendered = self.store.count_rendered(self.format, &channel.topics)?;
        let uploaded = self.store.count_uploads(&channel.id, self.format)?;
        Ok(rendered - uploaded)
    }

    /// Render at most one keyword for `channel`. Returns whether one was rendered.
    pub async fn render_for_channel(&self, channel: &Channel) -> Result<bool, PipelineError> {
        let format = self.format;
        let availability = self.availability(channel)?;
        let limit = i64::from(channel.daily_limit(format));
        if availability > limit {
            debug!(channel = %channel.name, %format, availability, limit, "Enough renders buffered");
            return Ok(false);
        }

        let Some(keyword) = self.store.claim_next_for_render(format, &channel.topics)? else {
            debug!(channel = %channel.name, %format, "Nothing to render");
            return Ok(false);
        };

        let result = match self.render(&keyword).await {
            Ok(task_id) => self
                .store
                .complete_render(&keyword.id, format, VideoRef { task_id })
                .map_err(PipelineError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.release_claim(&keyword);
            return Err(e);
        }
        Ok(true)
    }

    fn release_claim(&self, keyword: &Keyword) {
        if let Err(e) = self.store.release_render_claim(&keyword.id, self.format) {
            warn!(
                keyword = %keyword.keyword,
                format = %self.format,
                error = %e,
                "Failed to release render claim"
            );
        }
    }

    async fn render(&self, keyword: &Keyword) -> Result<String, PipelineError> {
        let format = self.format;
        let script = keyword.script().ok_or_else(|| StoreError::InvalidState {
            id: keyword.id.clone(),
            state: keyword.script_state.state_type().to_string(),
            operation: format!("render {}", format),
        })?;

        let request = RenderRequest::for_script(script, format);
        let started = Instant::now();
        let task_id = self.renderer.submit(&request).await?;
        metrics::RENDERS
            .with_label_values(&[format.as_str(), "started"])
            .inc();
        info!(keyword = %keyword.keyword, %format, task_id = %task_id, "Render submitted");

        match wait_for_completion(self.renderer.as_ref(), &task_id, &self.watch_settings()).await {
            Ok(_) => {
                let elapsed = started.elapsed();
                metrics::RENDERS
                    .with_label_values(&[format.as_str(), "completed"])
                    .inc();
                metrics::RENDER_DURATION
                    .with_label_values(&[format.as_str()])
                    .observe(elapsed.as_secs_f64());
                info!(keyword = %keyword.keyword, %format, task_id = %task_id, ?elapsed, "Render finished");
                Ok(task_id)
            }
            Err(e) => {
                let result = match e {
                    RenderError::Stuck { .. } => "stuck",
                    _ => "failed",
                };
                metrics::RENDERS
                    .with_label_values(&[format.as_str(), result])
                    .inc();
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Stage for RenderStage {
    fn name(&self) -> &'static str {
        match self.format {
            VideoFormat::Short => "render_short",
            VideoFormat::Long => "render_long",
        }
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let channels = self.store.list_channels(&ChannelFilter::active())?;
        let mut rendered = 0;

        for channel in &channels {
            match self.render_for_channel(channel).await {
                Ok(true) => rendered += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(channel = %channel.name, format = %self.format, error = %e, "Render failed");
                    self.reporter.capture("render", &e);
                }
            }
        }

        Ok(if rendered > 0 { Pass::Worked } else { Pass::Idle })
    }
}
