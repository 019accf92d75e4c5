//! Testing utilities and mock implementations of the external services.
//!
//! The mocks record every call and can be scripted to fail, so stage and
//! pipeline tests run without the script, render or upload backends.
//!
//! # Example
//!
//! ```rust,ignore
//! use autotube_core::testing::{MockScriptService, MockVideoRenderer};
//!
//! let scripts = MockScriptService::new();
//! scripts.set_related("travel", vec!["bali tips".into()]);
//!
//! let renderer = MockVideoRenderer::new();
//! renderer.set_default_sequence(vec![20.0, 60.0, 100.0]);
//! ```

mod mock_classifier;
mod mock_renderer;
mod mock_script_service;
mod mock_uploader;
mod recording_reporter;

pub use mock_classifier::MockClassifier;
pub use mock_renderer::MockVideoRenderer;
pub use mock_script_service::MockScriptService;
pub use mock_uploader::MockUploader;
pub use recording_reporter::RecordingReporter;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::store::{
        Channel, Keyword, KeywordStore, NewKeyword, RenderState, Script, ScriptState, Upload,
        VideoFormat, VideoRef, Visibility,
    };

    /// An in-memory active channel with every switch on.
    pub fn channel(name: &str, topics: &[&str]) -> Channel {
        let now = Utc::now();
        Channel {
            id: format!("channel-{}", name),
            name: name.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            max_daily_short_videos_limit: 1,
            max_daily_long_videos_limit: 1,
            chrome_profile_id: "Profile 1".to_string(),
            is_active: true,
            is_uploading_video: true,
            is_running_search_keyword: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// A script for `keyword` carrying the given comma-separated tags.
    pub fn script(keyword: &str, tags: &str) -> Script {
        Script {
            title: format!("Title: {}", keyword),
            description: format!("All about {}.", keyword),
            thumbnail: format!("{} thumbnail", keyword),
            tags: tags.to_string(),
            keyword: keyword.to_string(),
            body: format!("Today we talk about {}.", keyword),
        }
    }

    /// An in-memory keyword with a generated script and no renders.
    pub fn scripted_keyword(keyword: &str, topic: &str, tags: &str) -> Keyword {
        let now = Utc::now();
        Keyword {
            id: format!("kw-{}", keyword.replace(' ', "-")),
            keyword: keyword.to_string(),
            topic: topic.to_string(),
            second_topic: None,
            competition: 0.3,
            volume: 0.7,
            overall: 0.6,
            estimated_monthly_search: 1200.0,
            priority: 1.0,
            script_state: ScriptState::Generated {
                script: script(keyword, tags),
                generated_at: now,
            },
            short_state: RenderState::NotRequested,
            long_state: RenderState::NotRequested,
            created_at: now,
            updated_at: now,
        }
    }

    /// An in-memory keyword rendered in both formats under `task_id`.
    pub fn rendered_keyword(keyword: &str, topic: &str, tags: &str, task_id: &str) -> Keyword {
        let now = Utc::now();
        let done = || RenderState::Done {
            video: VideoRef {
                task_id: task_id.to_string(),
            },
            completed_at: now,
        };
        Keyword {
            short_state: done(),
            long_state: done(),
            ..scripted_keyword(keyword, topic, tags)
        }
    }

    /// An in-memory unlisted upload due in an hour.
    pub fn upload(channel: &Channel, keyword: &Keyword, format: VideoFormat) -> Upload {
        let now = Utc::now();
        Upload {
            id: format!("upload-{}-{}", keyword.id, format),
            channel_id: channel.id.clone(),
            keyword_id: keyword.id.clone(),
            video_type: format,
            visibility: Visibility::Unlisted,
            publish_at: now + chrono::Duration::hours(1),
            youtube_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert a keyword into `store` and drive it to `Generated`.
    ///
    /// Other pending keywords claimed along the way are released again.
    pub fn store_scripted_keyword(
        store: &dyn KeywordStore,
        keyword: &str,
        topic: &str,
        tags: &str,
        priority: f64,
    ) -> Keyword {
        let inserted = store
            .upsert_keyword(NewKeyword {
                keyword: keyword.to_string(),
                topic: topic.to_string(),
                priority,
                ..Default::default()
            })
            .unwrap();

        let mut held = Vec::new();
        loop {
            let claimed = store
                .claim_next_unscripted()
                .unwrap()
                .unwrap_or_else(|| panic!("keyword {} could not be claimed", keyword));
            if claimed.id == inserted.id {
                break;
            }
            held.push(claimed.id);
        }
        store.complete_script(&inserted.id, script(keyword, tags)).unwrap();
        for id in held {
            store.release_script_claim(&id).unwrap();
        }

        store.get_keyword(&inserted.id).unwrap().unwrap()
    }

    /// Insert a keyword into `store` and drive it to `Done` for `format`,
    /// with task id `{keyword}-{format}`.
    pub fn store_rendered_keyword(
        store: &dyn KeywordStore,
        keyword: &str,
        topic: &str,
        tags: &str,
        format: VideoFormat,
    ) -> Keyword {
        let scripted = store_scripted_keyword(store, keyword, topic, tags, 1.0);
        let topics = vec![topic.to_string()];

        let mut held = Vec::new();
        loop {
            let claimed = store
                .claim_next_for_render(format, &topics)
                .unwrap()
                .unwrap_or_else(|| panic!("keyword {} could not be claimed for render", keyword));
            if claimed.id == scripted.id {
                break;
            }
            held.push(claimed.id);
        }
        store
            .complete_render(
                &scripted.id,
                format,
                VideoRef {
                    task_id: format!("{}-{}", keyword, format),
                },
            )
            .unwrap();
        for id in held {
            store.release_render_claim(&id, format).unwrap();
        }

        store.get_keyword(&scripted.id).unwrap().unwrap()
    }
}
