//! In-process tests of the status API.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use autotube_core::classifier::ClassifierProvider;
use autotube_core::store::{
    ChannelStore, DayWindow, KeywordStore, NewChannel, NewKeyword, NewUpload, UploadStore,
    VideoFormat,
};
use autotube_core::Config;

use common::{fixtures, TestFixture};

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_status_reports_counts() {
    let fixture = TestFixture::new().await;
    let store = &fixture.store;

    let channel = store
        .create_channel(NewChannel::new("Wanderlust", vec!["travel".to_string()]))
        .unwrap();
    store
        .upsert_keyword(NewKeyword {
            keyword: "pending one".to_string(),
            topic: "travel".to_string(),
            ..Default::default()
        })
        .unwrap();
    let rendered =
        fixtures::store_rendered_keyword(store.as_ref(), "bali tips", "travel", "a", VideoFormat::Short);

    let now = Utc::now();
    store
        .create_upload_within_quota(
            NewUpload {
                channel_id: channel.id.clone(),
                keyword_id: rendered.id.clone(),
                video_type: VideoFormat::Short,
                publish_at: now + Duration::hours(12),
                created_at: now,
            },
            &DayWindow {
                start: now - Duration::hours(1),
                end: now + Duration::hours(1),
            },
            1,
        )
        .unwrap();

    let response = fixture.get("/api/v1/status").await;
    assert_status!(response, StatusCode::OK);

    let body = &response.body;
    assert_eq!(body["running"], false);
    assert_eq!(body["keywords"]["total"], 2);
    assert_eq!(body["keywords"]["script_pending"], 1);
    assert_eq!(body["keywords"]["script_generated"], 1);
    assert_eq!(body["keywords"]["short_done"], 1);
    assert_eq!(body["keywords"]["long_done"], 0);
    assert_eq!(body["uploads"]["unlisted"], 1);
    assert_eq!(body["uploads"]["public"], 0);

    let stages = body["stages"].as_array().unwrap();
    assert!(stages.iter().any(|s| s == "render_short"));
    assert!(stages.iter().all(|s| s != "reprioritize"));
}

#[tokio::test]
async fn test_status_reflects_running_pipeline() {
    let mut config = Config::default();
    config.pipeline.discovery.enabled = false;
    config.pipeline.rendering.enabled = false;
    config.pipeline.scheduling.enabled = false;
    config.pipeline.publishing.enabled = false;
    let fixture = TestFixture::with_config(config).await;

    fixture.pipeline.start().await;
    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["running"], true);
    assert_eq!(response.body["stages"], serde_json::json!(["scripting"]));

    fixture.pipeline.stop().await;
    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["running"], false);
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let mut config = Config::default();
    config.classifier.provider = ClassifierProvider::OpenRouter;
    config.classifier.api_key = Some("sk-secret".to_string());
    config.error_tracking.dsn = Some("https://key@errors.example.com/1".to_string());
    let fixture = TestFixture::with_config(config).await;

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);

    assert_eq!(response.body["classifier"]["provider"], "open_router");
    assert_eq!(response.body["classifier"]["api_key_configured"], true);
    assert_eq!(response.body["error_tracking"]["dsn_configured"], true);
    assert_eq!(response.body["schedule"]["timezone"], "America/New_York");
    assert!(!response.text.contains("sk-secret"));
    assert!(!response.text.contains("errors.example.com"));
}

#[tokio::test]
async fn test_metrics_exposes_pipeline_gauges() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .upsert_keyword(NewKeyword {
            keyword: "bali tips".to_string(),
            topic: "travel".to_string(),
            ..Default::default()
        })
        .unwrap();

    // Generate at least one request metric sample.
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("autotube_http_requests_total"));
    assert!(response.text.contains("autotube_pipeline_running"));
    assert!(response
        .text
        .contains("autotube_keywords_by_state{state=\"script_pending\"}"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/keywords").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}
