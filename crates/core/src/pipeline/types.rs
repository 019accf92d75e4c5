//! Types shared by the pipeline stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ClassifyError;
use crate::render::RenderError;
use crate::script_service::ScriptError;
use crate::store::{KeywordCounts, StoreError, UploadCounts};
use crate::uploader::UploadError;

use super::config::LoopPolicy;

/// Errors that can occur while running a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("classifier error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("script service error: {0}")]
    Script(#[from] ScriptError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Outcome of one pass of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Something was processed.
    Worked,
    /// Nothing to do.
    Idle,
}

/// A polling stage driven by the runner.
///
/// Per-item failures are handled inside [`Stage::run_once`]. An `Err` means
/// the whole pass could not run (usually the store).
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn policy(&self) -> LoopPolicy;

    async fn run_once(&self) -> Result<Pass, PipelineError>;

    /// Return to the supervisor after an idle pass instead of looping.
    fn exits_when_idle(&self) -> bool {
        false
    }
}

/// Current status of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub running: bool,
    /// Names of the stages that were started.
    pub stages: Vec<String>,
    pub keywords: KeywordCounts,
    pub uploads: UploadCounts,
}
