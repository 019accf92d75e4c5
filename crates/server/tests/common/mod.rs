//! Common test utilities for in-process API tests.
//!
//! Builds the real router around a pipeline wired to mock backends and a
//! temporary SQLite database. The pipeline loops are not started unless a
//! test does so explicitly.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use autotube_core::config::DatabaseConfig;
use autotube_core::testing::{
    MockClassifier, MockScriptService, MockUploader, MockVideoRenderer, RecordingReporter,
};
use autotube_core::{Config, Pipeline, PipelineServices, SqliteStore};
use autotube_server::state::AppState;

/// Re-export fixtures for test convenience
pub use autotube_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub pipeline: Arc<Pipeline>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        config.database = DatabaseConfig {
            path: db_path.clone(),
        };

        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));
        let services = PipelineServices {
            store: store.clone(),
            classifier: Arc::new(MockClassifier::new("travel")),
            scripts: Arc::new(MockScriptService::new()),
            renderer: Arc::new(MockVideoRenderer::new()),
            uploader: Arc::new(MockUploader::new()),
            reporter: Arc::new(RecordingReporter::new()),
        };
        let pipeline = Arc::new(
            Pipeline::new(
                services,
                config.pipeline.clone(),
                config.schedule.clone(),
                PathBuf::from("/srv/tasks"),
            )
            .expect("Failed to build pipeline"),
        );

        let state = Arc::new(AppState::new(config, Arc::clone(&pipeline)));
        let router = autotube_server::api::create_router(state);

        Self {
            router,
            store,
            pipeline,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
