use std::sync::Arc;

use autotube_core::{Config, Pipeline, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<Pipeline>) -> Self {
        Self { config, pipeline }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline.as_ref()
    }
}
