//! Keyword-to-YouTube content pipeline.
//!
//! Discovers keywords for each channel's topics, generates scripts, renders
//! short and long videos through an external backend, and schedules uploads
//! under a per-channel daily quota. All coordination happens through the
//! lifecycle states kept in [`store`].

pub mod classifier;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod reporting;
pub mod script_service;
pub mod store;
pub mod testing;
pub mod text;
pub mod uploader;

pub use classifier::{create_classifier, Classifier, ClassifierConfig, ClassifyError};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineServices, PipelineStatus};
pub use render::{HttpVideoRenderer, RenderError, VideoRenderer};
pub use reporting::{ErrorReporter, TracingReporter};
pub use script_service::{HttpScriptService, ScriptError, ScriptService};
pub use store::{SqliteStore, StoreError, WorkStore};
pub use uploader::{HttpUploader, UploadError, Uploader};
