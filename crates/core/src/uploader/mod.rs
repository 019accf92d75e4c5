//! Upload microservice client and payload construction.

mod http;

pub use http::HttpUploader;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Channel, Keyword, Upload, VideoFormat};

/// Character budget for the joined tag string before splitting.
pub const TAG_CHAR_BUDGET: usize = 480;

/// Maximum number of tags sent with an upload.
pub const MAX_TAGS: usize = 15;

/// File the renderer writes inside each task directory.
pub const RENDERED_FILE_NAME: &str = "final-1.mp4";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("upload service error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The keyword has no script or no finished render for the format.
    #[error("keyword {keyword_id} is not ready for a {format} upload")]
    NotReady {
        keyword_id: String,
        format: VideoFormat,
    },
}

/// Body of an upload request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub title: String,
    pub description: String,
    /// Empty for shorts.
    pub thumbnail: String,
    /// `", "`-joined tags.
    pub tags: String,
    pub file_path: String,
    pub chrome_profile_id: String,
    pub video_type: VideoFormat,
}

impl UploadPayload {
    /// Assemble the payload for a due upload.
    pub fn build(
        upload: &Upload,
        keyword: &Keyword,
        channel: &Channel,
        video_task_dir: &Path,
    ) -> Result<Self, UploadError> {
        let not_ready = || UploadError::NotReady {
            keyword_id: keyword.id.clone(),
            format: upload.video_type,
        };
        let script = keyword.script().ok_or_else(not_ready)?;
        let video = keyword.video(upload.video_type).ok_or_else(not_ready)?;

        let thumbnail = match upload.video_type {
            VideoFormat::Short => String::new(),
            VideoFormat::Long => script.thumbnail.clone(),
        };

        Ok(Self {
            title: script.title.clone(),
            description: script.description.clone(),
            thumbnail,
            tags: build_tags(&script.tags),
            file_path: video_file_path(video_task_dir, &video.task_id),
            chrome_profile_id: channel.chrome_profile_id.clone(),
            video_type: upload.video_type,
        })
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub youtube_link: String,
}

/// Client for the upload microservice.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadResult, UploadError>;
}

/// Reduce a comma-separated tag string to at most [`MAX_TAGS`] entries.
///
/// The string is cut to [`TAG_CHAR_BUDGET`] characters first. When the cut
/// lands inside the list the trailing partial tag is dropped.
pub fn build_tags(tags: &str) -> String {
    let truncated = tags.chars().count() > TAG_CHAR_BUDGET;
    let budget: String = tags.chars().take(TAG_CHAR_BUDGET).collect();

    let mut parts: Vec<&str> = budget.split(',').collect();
    if truncated {
        parts.pop();
    }

    parts
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `<video_task_dir>/<task_id>/final-1.mp4`
pub fn video_file_path(video_task_dir: &Path, task_id: &str) -> String {
    video_task_dir
        .join(task_id)
        .join(RENDERED_FILE_NAME)
        .to_string_lossy()
        .into_owned()
}
