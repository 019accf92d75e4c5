//! Storage traits for the work-item store.
//!
//! Every loop coordinates exclusively through these traits. Operations that
//! select and mutate in one step (claims, quota-guarded inserts, publishing)
//! must be atomic in the backing implementation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{
    Channel, ChannelFilter, DayWindow, Keyword, KeywordCounts, NewChannel, NewKeyword, NewUpload,
    Script, TopicSearch, Upload, UploadCounts, UploadInsert, VideoFormat, VideoRef,
};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("cannot {operation} {id}: current state is {state}")]
    InvalidState {
        id: String,
        state: String,
        operation: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Keyword queue and lifecycle ledger.
pub trait KeywordStore: Send + Sync {
    /// Get a keyword by ID.
    fn get_keyword(&self, id: &str) -> Result<Option<Keyword>, StoreError>;

    /// Whether a keyword with this exact text exists.
    fn keyword_exists(&self, keyword: &str) -> Result<bool, StoreError>;

    /// Insert a keyword or refresh the discovery data of the existing one
    /// with the same text. Lifecycle states are never touched.
    fn upsert_keyword(&self, keyword: NewKeyword) -> Result<Keyword, StoreError>;

    /// Atomically move the highest-priority `Pending` keyword to `Generating`.
    fn claim_next_unscripted(&self) -> Result<Option<Keyword>, StoreError>;

    /// `Generating -> Generated`.
    fn complete_script(&self, id: &str, script: Script) -> Result<Keyword, StoreError>;

    /// `Generating -> Pending`.
    fn release_script_claim(&self, id: &str) -> Result<(), StoreError>;

    /// Atomically move the highest-priority scripted keyword matching `topics`
    /// from `NotRequested` to `Rendering` for `format`.
    fn claim_next_for_render(
        &self,
        format: VideoFormat,
        topics: &[String],
    ) -> Result<Option<Keyword>, StoreError>;

    /// `Rendering -> Done`.
    fn complete_render(
        &self,
        id: &str,
        format: VideoFormat,
        video: VideoRef,
    ) -> Result<Keyword, StoreError>;

    /// `Rendering -> NotRequested`.
    fn release_render_claim(&self, id: &str, format: VideoFormat) -> Result<(), StoreError>;

    /// Count keywords rendered for `format` whose topic matches `topics`.
    fn count_rendered(&self, format: VideoFormat, topics: &[String]) -> Result<i64, StoreError>;

    /// Keywords rendered for `format` matching `topics`, highest priority first.
    fn list_rendered(
        &self,
        format: VideoFormat,
        topics: &[String],
    ) -> Result<Vec<Keyword>, StoreError>;

    /// Oldest-updated keywords first.
    fn list_least_recently_updated(&self, limit: i64) -> Result<Vec<Keyword>, StoreError>;

    /// Overwrite priority scoring results.
    fn set_priority(
        &self,
        id: &str,
        priority: f64,
        second_topic: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Permanently delete a keyword. Returns false if it did not exist.
    fn delete_keyword(&self, id: &str) -> Result<bool, StoreError>;

    /// Reset every `Generating`/`Rendering` claim left behind by a previous
    /// process. Returns the number of keywords touched.
    fn release_stale_claims(&self) -> Result<usize, StoreError>;

    fn keyword_counts(&self) -> Result<KeywordCounts, StoreError>;
}

/// Operator-managed publishing destinations.
pub trait ChannelStore: Send + Sync {
    fn create_channel(&self, channel: NewChannel) -> Result<Channel, StoreError>;

    fn get_channel(&self, id: &str) -> Result<Option<Channel>, StoreError>;

    fn list_channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError>;
}

/// Scheduled and published uploads.
pub trait UploadStore: Send + Sync {
    /// Insert an `Unlisted` upload unless the channel already holds `limit`
    /// uploads of the same format created inside `window`.
    fn create_upload_within_quota(
        &self,
        upload: NewUpload,
        window: &DayWindow,
        limit: u32,
    ) -> Result<UploadInsert, StoreError>;

    fn get_upload(&self, id: &str) -> Result<Option<Upload>, StoreError>;

    /// All uploads ever created for a channel and format.
    fn count_uploads(&self, channel_id: &str, format: VideoFormat) -> Result<i64, StoreError>;

    /// Uploads for a channel and format created inside `window`.
    fn count_uploads_in_window(
        &self,
        channel_id: &str,
        format: VideoFormat,
        window: &DayWindow,
    ) -> Result<i64, StoreError>;

    /// Keyword IDs already scheduled on a channel for a format.
    fn scheduled_keyword_ids(
        &self,
        channel_id: &str,
        format: VideoFormat,
    ) -> Result<HashSet<String>, StoreError>;

    /// `Unlisted` uploads whose `publish_at` is at or before `now`.
    fn list_due_uploads(&self, now: DateTime<Utc>) -> Result<Vec<Upload>, StoreError>;

    /// Flip an `Unlisted` upload to `Public`. Returns false if it was not
    /// unlisted anymore.
    fn publish_upload(&self, id: &str, youtube_link: &str) -> Result<bool, StoreError>;

    fn upload_counts(&self) -> Result<UploadCounts, StoreError>;
}

/// Topic expansion checkpoints.
pub trait TopicSearchStore: Send + Sync {
    /// Whether `topic` has been expanded before.
    fn topic_expanded(&self, topic: &str) -> Result<bool, StoreError>;

    /// Insert the pair if missing. Existing pairs keep their handled flag.
    fn upsert_topic_search(
        &self,
        topic: &str,
        related_topic: &str,
    ) -> Result<TopicSearch, StoreError>;

    fn list_unhandled_topic_searches(&self, topic: &str) -> Result<Vec<TopicSearch>, StoreError>;

    fn mark_topic_search_handled(&self, id: &str) -> Result<(), StoreError>;
}

/// Everything the pipeline needs from persistence.
pub trait WorkStore: KeywordStore + ChannelStore + UploadStore + TopicSearchStore {}

impl<T> WorkStore for T where T: KeywordStore + ChannelStore + UploadStore + TopicSearchStore {}
