//! Prometheus metrics for the pipeline stages.
//!
//! The collectors are process-global. The server registers them through
//! [`all_metrics`] and exposes them on `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Discovery
// =============================================================================

/// Keywords stored by topic discovery.
pub static KEYWORDS_DISCOVERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "autotube_keywords_discovered_total",
        "Keywords classified and stored by discovery",
    )
    .unwrap()
});

/// Candidate keywords dropped by discovery.
pub static KEYWORDS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "autotube_keywords_skipped_total",
            "Candidate keywords dropped before storage",
        ),
        &["reason"], // "not_english", "exists"
    )
    .unwrap()
});

// =============================================================================
// Scripts
// =============================================================================

/// Script generation attempts by result.
pub static SCRIPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_scripts_total", "Script generation attempts"),
        &["result"], // "generated", "failed", "invalid"
    )
    .unwrap()
});

// =============================================================================
// Renders
// =============================================================================

/// Render tasks by format and result.
pub static RENDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_renders_total", "Render tasks by outcome"),
        &["format", "result"], // "started", "completed", "failed", "stuck"
    )
    .unwrap()
});

/// Time from submission to a finished render.
pub static RENDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autotube_render_duration_seconds",
            "Duration of successful renders",
        )
        .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0]),
        &["format"],
    )
    .unwrap()
});

// =============================================================================
// Uploads
// =============================================================================

/// Uploads created by the scheduler.
pub static UPLOADS_SCHEDULED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_uploads_scheduled_total", "Uploads scheduled"),
        &["format"],
    )
    .unwrap()
});

/// Upload attempts by result.
pub static UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_uploads_total", "Upload attempts"),
        &["result"], // "published", "failed"
    )
    .unwrap()
});

// =============================================================================
// Errors
// =============================================================================

/// Errors handed to the error reporter, by stage.
pub static ERRORS_REPORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_errors_reported_total", "Errors reported by stage"),
        &["stage"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(KEYWORDS_DISCOVERED.clone()),
        Box::new(KEYWORDS_SKIPPED.clone()),
        Box::new(SCRIPTS.clone()),
        Box::new(RENDERS.clone()),
        Box::new(RENDER_DURATION.clone()),
        Box::new(UPLOADS_SCHEDULED.clone()),
        Box::new(UPLOADS.clone()),
        Box::new(ERRORS_REPORTED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        SCRIPTS.with_label_values(&["generated"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"autotube_scripts_total".to_string()));
    }
}
