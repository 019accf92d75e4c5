//! Work-item records shared by every pipeline stage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output format of a rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    /// Vertical 9:16 short.
    Short,
    /// Regular 16:9 video.
    Long,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 2] = [VideoFormat::Short, VideoFormat::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Short => "short",
            VideoFormat::Long => "long",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(VideoFormat::Short),
            "long" => Ok(VideoFormat::Long),
            other => Err(format!("unknown video format: {}", other)),
        }
    }
}

/// Generated script metadata attached to a keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    /// Comma-separated tag list as returned by the script backend.
    pub tags: String,
    /// Keyword text the script was generated for.
    pub keyword: String,
    /// Narration body. Older records may not carry one.
    #[serde(default)]
    pub body: String,
}

impl Script {
    /// Individual tags, trimmed, empty entries dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Reference to a finished render on the video backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub task_id: String,
}

/// Script lifecycle of a keyword.
///
/// ```text
/// Pending ──claim──▶ Generating ──ok──▶ Generated
///    ▲                   │
///    └────release────────┤ recoverable failure
///                        └──▶ (keyword deleted) on invalid keyword
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptState {
    Pending,
    Generating { claimed_at: DateTime<Utc> },
    Generated { script: Script, generated_at: DateTime<Utc> },
}

impl ScriptState {
    /// Tag stored in the `type` field of the serialized state.
    pub fn state_type(&self) -> &'static str {
        match self {
            ScriptState::Pending => "pending",
            ScriptState::Generating { .. } => "generating",
            ScriptState::Generated { .. } => "generated",
        }
    }

    pub fn script(&self) -> Option<&Script> {
        match self {
            ScriptState::Generated { script, .. } => Some(script),
            _ => None,
        }
    }
}

/// Render lifecycle of a keyword for one video format.
///
/// ```text
/// NotRequested ──claim──▶ Rendering ──progress 100──▶ Done
///       ▲                     │
///       └──────release────────┘ failure or stuck task
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderState {
    NotRequested,
    Rendering { claimed_at: DateTime<Utc> },
    Done { video: VideoRef, completed_at: DateTime<Utc> },
}

impl RenderState {
    pub fn state_type(&self) -> &'static str {
        match self {
            RenderState::NotRequested => "not_requested",
            RenderState::Rendering { .. } => "rendering",
            RenderState::Done { .. } => "done",
        }
    }

    pub fn video(&self) -> Option<&VideoRef> {
        match self {
            RenderState::Done { video, .. } => Some(video),
            _ => None,
        }
    }
}

/// A unit of content work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    /// Keyword text, unique across the store.
    pub keyword: String,
    /// Topic assigned by the classifier.
    pub topic: String,
    /// Closest channel topic, set by priority scoring.
    pub second_topic: Option<String>,
    pub competition: f64,
    pub volume: f64,
    pub overall: f64,
    pub estimated_monthly_search: f64,
    /// Higher is more urgent.
    pub priority: f64,
    pub script_state: ScriptState,
    pub short_state: RenderState,
    pub long_state: RenderState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyword {
    pub fn is_generated_script(&self) -> bool {
        matches!(self.script_state, ScriptState::Generated { .. })
    }

    pub fn is_short_generated(&self) -> bool {
        self.is_generated(VideoFormat::Short)
    }

    pub fn is_long_generated(&self) -> bool {
        self.is_generated(VideoFormat::Long)
    }

    pub fn is_generated(&self, format: VideoFormat) -> bool {
        matches!(self.render_state(format), RenderState::Done { .. })
    }

    pub fn script(&self) -> Option<&Script> {
        self.script_state.script()
    }

    pub fn render_state(&self, format: VideoFormat) -> &RenderState {
        match format {
            VideoFormat::Short => &self.short_state,
            VideoFormat::Long => &self.long_state,
        }
    }

    pub fn video(&self, format: VideoFormat) -> Option<&VideoRef> {
        self.render_state(format).video()
    }
}

/// Discovery data for a keyword upsert.
#[derive(Debug, Clone, Default)]
pub struct NewKeyword {
    pub keyword: String,
    pub topic: String,
    pub second_topic: Option<String>,
    pub competition: f64,
    pub volume: f64,
    pub overall: f64,
    pub estimated_monthly_search: f64,
    pub priority: f64,
}

/// A publishing destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub topics: Vec<String>,
    pub max_daily_short_videos_limit: u32,
    pub max_daily_long_videos_limit: u32,
    /// Browser profile the upload service signs in with.
    pub chrome_profile_id: String,
    pub is_active: bool,
    pub is_uploading_video: bool,
    pub is_running_search_keyword: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn daily_limit(&self, format: VideoFormat) -> u32 {
        match format {
            VideoFormat::Short => self.max_daily_short_videos_limit,
            VideoFormat::Long => self.max_daily_long_videos_limit,
        }
    }
}

/// Request to register a channel.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub topics: Vec<String>,
    pub max_daily_short_videos_limit: u32,
    pub max_daily_long_videos_limit: u32,
    pub chrome_profile_id: String,
    pub is_active: bool,
    pub is_uploading_video: bool,
    pub is_running_search_keyword: bool,
}

impl NewChannel {
    /// An active channel with every pipeline switch on.
    pub fn new(name: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            name: name.into(),
            topics,
            max_daily_short_videos_limit: 1,
            max_daily_long_videos_limit: 1,
            chrome_profile_id: String::new(),
            is_active: true,
            is_uploading_video: true,
            is_running_search_keyword: true,
        }
    }

    pub fn with_limits(mut self, short: u32, long: u32) -> Self {
        self.max_daily_short_videos_limit = short;
        self.max_daily_long_videos_limit = long;
        self
    }

    pub fn with_chrome_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.chrome_profile_id = profile_id.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Filter for listing channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub is_active: Option<bool>,
    pub is_running_search_keyword: Option<bool>,
}

impl ChannelFilter {
    pub fn active() -> Self {
        Self {
            is_active: Some(true),
            ..Default::default()
        }
    }

    pub fn searching() -> Self {
        Self {
            is_active: Some(true),
            is_running_search_keyword: Some(true),
        }
    }
}

/// Visibility of an upload on the destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlisted" => Ok(Visibility::Unlisted),
            "public" => Ok(Visibility::Public),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// Assignment of one keyword's render to one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub channel_id: String,
    pub keyword_id: String,
    pub video_type: VideoFormat,
    pub visibility: Visibility,
    pub publish_at: DateTime<Utc>,
    pub youtube_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to schedule an upload.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub channel_id: String,
    pub keyword_id: String,
    pub video_type: VideoFormat,
    pub publish_at: DateTime<Utc>,
    /// Creation time, which is what the daily quota counts.
    pub created_at: DateTime<Utc>,
}

/// Half-open window `[start, end)` used for per-day quota counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of a quota-guarded upload insert.
#[derive(Debug, Clone)]
pub enum UploadInsert {
    Created(Upload),
    /// The channel already has `limit` uploads of this format in the window.
    QuotaExhausted,
    /// The keyword is already scheduled on this channel for this format.
    AlreadyScheduled,
}

/// Memoized expansion of a seed topic into one related topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSearch {
    pub id: String,
    pub topic: String,
    pub related_topic: String,
    /// Question extraction has run for this pair.
    pub is_handled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keyword counts per lifecycle state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordCounts {
    pub total: i64,
    pub script_pending: i64,
    pub script_generating: i64,
    pub script_generated: i64,
    pub short_rendering: i64,
    pub short_done: i64,
    pub long_rendering: i64,
    pub long_done: i64,
}

/// Upload counts per visibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadCounts {
    pub unlisted: i64,
    pub public: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(topic: &str, second: Option<&str>) -> Keyword {
        let now = Utc::now();
        Keyword {
            id: "k1".to_string(),
            keyword: "how to travel cheap".to_string(),
            topic: topic.to_string(),
            second_topic: second.map(String::from),
            competition: 0.0,
            volume: 0.0,
            overall: 0.0,
            estimated_monthly_search: 0.0,
            priority: 0.0,
            script_state: ScriptState::Pending,
            short_state: RenderState::NotRequested,
            long_state: RenderState::NotRequested,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_script_state_serialization_is_tagged() {
        let json = serde_json::to_string(&ScriptState::Pending).unwrap();
        assert_eq!(json, r#"{"type":"pending"}"#);

        let state = RenderState::Done {
            video: VideoRef {
                task_id: "t-1".to_string(),
            },
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""type":"done""#));
        let parsed: RenderState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.video().unwrap().task_id, "t-1");
    }

    #[test]
    fn test_flags_follow_states() {
        let mut kw = keyword("travel", None);
        assert!(!kw.is_generated_script());
        assert!(kw.script().is_none());
        assert!(!kw.is_short_generated());
        assert!(kw.video(VideoFormat::Short).is_none());

        kw.long_state = RenderState::Rendering {
            claimed_at: Utc::now(),
        };
        assert!(!kw.is_long_generated());
        assert!(kw.video(VideoFormat::Long).is_none());
    }

    #[test]
    fn test_tag_list_skips_blank_entries() {
        let script = Script {
            title: String::new(),
            description: String::new(),
            thumbnail: String::new(),
            tags: "a, b,,c ,".to_string(),
            keyword: String::new(),
            body: String::new(),
        };
        assert_eq!(script.tag_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_video_format_round_trip_str() {
        for format in VideoFormat::ALL {
            assert_eq!(format.as_str().parse::<VideoFormat>().unwrap(), format);
        }
        assert!("medium".parse::<VideoFormat>().is_err());
    }
}
