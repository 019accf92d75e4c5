//! Video rendering backend.
//!
//! Renders are asynchronous tasks: [`VideoRenderer::submit`] returns a task
//! id that is polled with [`VideoRenderer::get_task`] until progress reaches
//! 100. [`wait_for_completion`] drives that polling with stuck detection.

mod http;
mod watcher;

pub use http::HttpVideoRenderer;
pub use watcher::{wait_for_completion, WatchSettings};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Script, VideoFormat};

/// Tags are only sent as search terms when there are at least this many.
pub const MIN_VIDEO_TERMS: usize = 5;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("render service error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Progress did not move for at least `waited`.
    #[error("render progress stuck at {progress}% for {waited:?}")]
    Stuck { progress: f64, waited: Duration },
}

/// Snapshot of a render task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<i64>,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        self.progress >= 100.0
    }
}

/// Client for the rendering backend.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Start a render and return its task id.
    async fn submit(&self, request: &RenderRequest) -> Result<String, RenderError>;

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus, RenderError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), RenderError>;
}

/// Render task payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub video_subject: String,
    pub video_description: String,
    /// Comma-separated stock footage search terms, empty to let the backend pick.
    pub video_terms: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_script: Option<String>,
    pub video_aspect: String,
    pub video_concat_mode: String,
    pub video_clip_duration: u32,
    pub video_count: u32,
    pub video_source: String,
    pub video_materials: Option<Vec<String>>,
    pub video_language: String,
    pub voice_name: String,
    pub voice_volume: f64,
    pub voice_rate: f64,
    pub bgm_type: String,
    pub bgm_file: String,
    pub bgm_volume: f64,
    pub subtitle_enabled: bool,
    pub subtitle_position: String,
    pub custom_position: f64,
    pub font_name: String,
    pub text_fore_color: String,
    pub text_background_color: bool,
    pub font_size: u32,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub n_threads: u32,
    pub paragraph_number: u32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            video_subject: String::new(),
            video_description: String::new(),
            video_terms: String::new(),
            thumbnail: String::new(),
            video_script: None,
            video_aspect: "16:9".to_string(),
            video_concat_mode: "random".to_string(),
            video_clip_duration: 10,
            video_count: 1,
            video_source: "pexels".to_string(),
            video_materials: None,
            video_language: "en-US".to_string(),
            voice_name: "en-US-AndrewMultilingualNeural-Male".to_string(),
            voice_volume: 1.0,
            voice_rate: 1.0,
            bgm_type: String::new(),
            bgm_file: String::new(),
            bgm_volume: 0.0,
            subtitle_enabled: true,
            subtitle_position: "bottom".to_string(),
            custom_position: 70.0,
            font_name: "Montserrat.ttf".to_string(),
            text_fore_color: "#FFFFFF".to_string(),
            text_background_color: true,
            font_size: 60,
            stroke_color: "#000000".to_string(),
            stroke_width: 1.5,
            n_threads: 8,
            paragraph_number: 1,
        }
    }
}

impl RenderRequest {
    /// Build the payload for `script` in `format`: defaults, then the format
    /// overlay, then the script fields.
    pub fn for_script(script: &Script, format: VideoFormat) -> Self {
        let mut request = Self::default();

        match format {
            VideoFormat::Short => {
                request.video_aspect = "9:16".to_string();
                request.video_clip_duration = 5;
                request.subtitle_position = "custom".to_string();
                request.custom_position = 70.0;
                request.text_fore_color = "#FFFFFF".to_string();
                request.font_size = 75;
                request.stroke_color = "#000000".to_string();
                request.stroke_width = 5.0;
                request.video_script = Some(String::new());
            }
            VideoFormat::Long => {
                request.paragraph_number = 50;
                request.video_clip_duration = 10;
                if !script.body.is_empty() {
                    request.video_script = Some(script.body.clone());
                }
            }
        }

        request.video_subject = script.title.clone();
        request.video_description = script.description.clone();
        request.thumbnail = script.thumbnail.clone();
        request.video_terms = video_terms(script);
        request
    }
}

/// Script tags passed through verbatim when there are enough of them.
pub fn video_terms(script: &Script) -> String {
    if script.tag_list().len() >= MIN_VIDEO_TERMS {
        script.tags.clone()
    } else {
        String::new()
    }
}
