//! Error tracking seam.
//!
//! Loops hand every per-item failure to an [`ErrorReporter`] before backing
//! off. The default reporter turns them into structured `error!` events.

use std::fmt::Display;

use tracing::error;

use crate::config::ErrorTrackingConfig;
use crate::metrics;

/// Receives failures the loops recovered from.
pub trait ErrorReporter: Send + Sync {
    /// Record a failure in `stage` (e.g. `"script"`, `"render"`).
    fn capture(&self, stage: &str, error: &dyn Display);
}

/// Reports errors as tracing events.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    environment: String,
    dsn_configured: bool,
}

impl TracingReporter {
    pub fn new(config: &ErrorTrackingConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            dsn_configured: config.dsn.is_some(),
        }
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new(&ErrorTrackingConfig::default())
    }
}

impl ErrorReporter for TracingReporter {
    fn capture(&self, stage: &str, err: &dyn Display) {
        metrics::ERRORS_REPORTED.with_label_values(&[stage]).inc();
        error!(
            stage,
            environment = %self.environment,
            tracked = self.dsn_configured,
            error = %err,
            "Pipeline error"
        );
    }
}
